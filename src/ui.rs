use crate::models::{Progress, Theme};
use crate::zones::COUNTRIES;

pub struct AppPage<'a> {
    pub name: &'a str,
    pub date: &'a str,
    pub count: u32,
    pub goal: u32,
    pub progress: Progress,
    pub theme: Theme,
}

pub fn render_app(page: &AppPage<'_>) -> String {
    let status = if page.progress.goal_met {
        "Goal reached".to_string()
    } else {
        format!("{} glasses to go", page.progress.remaining)
    };
    APP_HTML
        .replace("{{STYLE}}", STYLE)
        .replace("{{THEME}}", page.theme.as_str())
        .replace("{{NAME}}", &escape_html(page.name))
        .replace("{{DATE}}", page.date)
        .replace("{{COUNT}}", &page.count.to_string())
        .replace("{{GOAL}}", &page.goal.to_string())
        .replace("{{PERCENT}}", &format!("{:.0}", page.progress.percent))
        .replace("{{STATUS}}", &status)
}

pub fn render_login() -> String {
    let options: String = COUNTRIES
        .iter()
        .map(|country| {
            format!(
                r#"<option value="{}">{}</option>"#,
                country.code,
                escape_html(country.name)
            )
        })
        .collect();
    LOGIN_HTML
        .replace("{{STYLE}}", STYLE)
        .replace("{{COUNTRIES}}", &options)
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = r#"
    :root {
      --bg: #eef7fb;
      --ink: #1e293b;
      --muted: #64748b;
      --card: #ffffff;
      --accent: #0ea5e9;
      --accent-2: #2563eb;
      --met: #16a34a;
      --over: #f87171;
      --danger: #dc2626;
      --shadow: 0 20px 50px rgba(15, 23, 42, 0.12);
    }

    body.dark {
      --bg: #0f172a;
      --ink: #e2e8f0;
      --muted: #94a3b8;
      --card: #1e293b;
      --shadow: 0 20px 50px rgba(0, 0, 0, 0.4);
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 24px 16px 48px;
    }

    .app {
      width: min(760px, 100%);
      display: grid;
      gap: 20px;
    }

    .card {
      background: var(--card);
      border-radius: 22px;
      box-shadow: var(--shadow);
      padding: 28px;
      display: grid;
      gap: 14px;
    }

    h1, h2 { margin: 0; }

    nav {
      display: flex;
      flex-wrap: wrap;
      gap: 8px;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 10px 18px;
      font-size: 1rem;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent);
      color: white;
    }

    button.ghost {
      background: transparent;
      color: var(--accent-2);
      border: 1px solid var(--accent-2);
    }

    button.danger { background: var(--danger); }

    input, select {
      width: 100%;
      padding: 10px 12px;
      border-radius: 10px;
      border: 1px solid #cbd5e1;
      font-size: 1rem;
      background: transparent;
      color: var(--ink);
    }

    .row {
      display: flex;
      gap: 8px;
      align-items: center;
      flex-wrap: wrap;
    }

    .grid-2 {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(220px, 1fr));
      gap: 12px;
    }

    .count {
      font-size: 4rem;
      font-weight: 700;
      text-align: center;
    }

    .progress-bar {
      height: 14px;
      border-radius: 999px;
      background: rgba(100, 116, 139, 0.2);
      overflow: hidden;
    }

    .progress-fill {
      height: 100%;
      background: linear-gradient(90deg, var(--accent), var(--accent-2));
    }

    .progress-fill.met {
      background: linear-gradient(90deg, var(--met), #4ade80);
    }

    .field-error {
      color: var(--danger);
      font-size: 0.85rem;
      min-height: 1em;
    }

    .status { min-height: 1.2em; color: var(--muted); }
    .status[data-type="error"] { color: var(--danger); }
    .status[data-type="ok"] { color: var(--met); }

    .hidden { display: none; }

    #chart { width: 100%; height: 260px; display: block; }
    .bar { fill: var(--accent); }
    .bar.met { fill: var(--over); }
    .goal-line { stroke: var(--accent-2); stroke-width: 1.5; }
    .chart-label { fill: var(--muted); font-size: 11px; }

    .records { display: grid; gap: 8px; }
    .record { display: grid; grid-template-columns: 110px 1fr; gap: 12px; align-items: center; }
"#;

const LOGIN_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Water Log</title>
  <style>{{STYLE}}</style>
</head>
<body>
  <main class="app">
    <section class="card" id="login-card">
      <h1>Welcome</h1>
      <p class="status">Sign in with your email and password.</p>
      <input id="login-email" type="email" placeholder="Email" />
      <input id="login-password" type="password" placeholder="Password" />
      <div class="row">
        <button id="login-btn" type="button">Sign in</button>
        <button id="forgot-btn" class="ghost" type="button">Forgot your password?</button>
        <button id="to-register" class="ghost" type="button">Create an account</button>
      </div>
      <div class="row">
        <input id="verify-token" placeholder="Verification code" />
        <button id="verify-btn" class="ghost" type="button">Verify email</button>
      </div>
      <div class="row">
        <input id="reset-token" placeholder="Reset code" />
        <input id="reset-password" type="password" placeholder="New password" />
        <button id="reset-btn" class="ghost" type="button">Set password</button>
      </div>
      <div class="status" id="login-status"></div>
    </section>

    <section class="card hidden" id="register-card">
      <h1>Sign up</h1>
      <div class="grid-2">
        <div><input id="reg-name" placeholder="Name" /><div class="field-error" data-field="name"></div></div>
        <div><input id="reg-surname" placeholder="Surname" /><div class="field-error" data-field="surname"></div></div>
      </div>
      <div><input id="reg-email" type="email" placeholder="Email" /><div class="field-error" data-field="email"></div></div>
      <div class="grid-2">
        <div><input id="reg-password" type="password" placeholder="Password" /><div class="field-error" data-field="password"></div></div>
        <div><input id="reg-password2" type="password" placeholder="Repeat password" /><div class="field-error" data-field="password_confirm"></div></div>
      </div>
      <div class="grid-2">
        <div><input id="reg-goal" type="number" min="1" max="20" placeholder="Daily goal (glasses)" /><div class="field-error" data-field="goal"></div></div>
        <div>
          <select id="reg-country"><option value="">Choose your country</option>{{COUNTRIES}}</select>
          <div class="field-error" data-field="country"></div>
        </div>
      </div>
      <div class="row">
        <button id="register-btn" type="button">Sign up</button>
        <button id="to-login" class="ghost" type="button">I already have an account</button>
      </div>
      <div class="status" id="register-status"></div>
    </section>
  </main>

  <script>
    const $ = (id) => document.getElementById(id);

    const setStatus = (el, message, type) => {
      el.textContent = message;
      el.dataset.type = type || '';
    };

    const post = async (url, body) => {
      const res = await fetch(url, {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify(body)
      });
      const data = await res.json().catch(() => ({}));
      if (!res.ok) {
        const err = new Error(data.error || 'Request failed');
        err.fields = data.fields || {};
        throw err;
      }
      return data;
    };

    const show = (card) => {
      $('login-card').classList.toggle('hidden', card !== 'login');
      $('register-card').classList.toggle('hidden', card !== 'register');
    };

    $('to-register').addEventListener('click', () => show('register'));
    $('to-login').addEventListener('click', () => show('login'));

    $('login-btn').addEventListener('click', async () => {
      const email = $('login-email').value;
      const password = $('login-password').value;
      try {
        await post('/api/auth/login', { email, password });
        window.location.reload();
      } catch (err) {
        setStatus($('login-status'), err.message, 'error');
      }
    });

    $('forgot-btn').addEventListener('click', async () => {
      try {
        const data = await post('/api/auth/password/forgot', { email: $('login-email').value });
        if (data.token) {
          $('reset-token').value = data.token;
        }
        setStatus($('login-status'), data.message, 'ok');
      } catch (err) {
        setStatus($('login-status'), err.message, 'error');
      }
    });

    $('verify-btn').addEventListener('click', async () => {
      try {
        const data = await post('/api/auth/verify', { token: $('verify-token').value });
        setStatus($('login-status'), data.message, 'ok');
      } catch (err) {
        setStatus($('login-status'), err.message, 'error');
      }
    });

    $('reset-btn').addEventListener('click', async () => {
      try {
        const data = await post('/api/auth/password/reset', {
          token: $('reset-token').value,
          password: $('reset-password').value
        });
        setStatus($('login-status'), data.message, 'ok');
      } catch (err) {
        const detail = Object.values(err.fields || {})[0];
        setStatus($('login-status'), detail || err.message, 'error');
      }
    });

    $('register-btn').addEventListener('click', async () => {
      document.querySelectorAll('.field-error').forEach((el) => { el.textContent = ''; });
      const goal = parseInt($('reg-goal').value, 10);
      try {
        const data = await post('/api/auth/register', {
          name: $('reg-name').value,
          surname: $('reg-surname').value,
          email: $('reg-email').value,
          password: $('reg-password').value,
          password_confirm: $('reg-password2').value,
          country: $('reg-country').value,
          goal: Number.isNaN(goal) ? null : goal
        });
        if (data.verification_token) {
          $('verify-token').value = data.verification_token;
        }
        show('login');
        setStatus($('login-status'), data.message, 'ok');
      } catch (err) {
        Object.entries(err.fields || {}).forEach(([field, message]) => {
          const el = document.querySelector(`.field-error[data-field="${field}"]`);
          if (el) { el.textContent = message; }
        });
        setStatus($('register-status'), err.message, 'error');
      }
    });
  </script>
</body>
</html>
"#;

const APP_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Water Log</title>
  <style>{{STYLE}}</style>
</head>
<body class="{{THEME}}">
  <main class="app">
    <nav>
      <button class="ghost" type="button" data-screen="home">Home</button>
      <button class="ghost" type="button" data-screen="history">History</button>
      <button class="ghost" type="button" data-screen="preferences">Preferences</button>
      <button class="ghost" type="button" data-screen="account">Account</button>
      <button class="ghost" type="button" id="logout-btn">Sign out</button>
    </nav>

    <section class="card screen" id="screen-home">
      <h2>Hi, {{NAME}}</h2>
      <div class="row">
        <button class="ghost" type="button" id="prev-day">&lt;</button>
        <input type="date" id="date" value="{{DATE}}" style="max-width: 200px" />
        <button class="ghost" type="button" id="next-day">&gt;</button>
        <button class="ghost" type="button" id="today">Today</button>
      </div>
      <div class="count" id="count">{{COUNT}}</div>
      <div class="row">
        <form method="post" action="/count/decrement"><button type="submit" id="minus">-</button></form>
        <form method="post" action="/count/increment"><button type="submit" id="plus">+</button></form>
        <button class="danger" type="button" id="reset">Reset</button>
      </div>
      <div class="progress-bar"><div class="progress-fill" id="fill" style="width: {{PERCENT}}%"></div></div>
      <div id="remaining">{{STATUS}}</div>
      <div class="status" id="home-status"></div>
    </section>

    <section class="card screen hidden" id="screen-history">
      <h2 id="history-title">History</h2>
      <div class="row">
        <button class="ghost" type="button" id="history-prev">&lt;</button>
        <button class="ghost" type="button" id="history-view">Show week</button>
        <button class="ghost" type="button" id="history-next">&gt;</button>
      </div>
      <svg id="chart" viewBox="0 0 600 260" role="img" aria-label="Glasses per day"></svg>
      <div class="records" id="records"></div>
      <div class="status" id="history-status"></div>
    </section>

    <section class="card screen hidden" id="screen-preferences">
      <h2>Preferences</h2>
      <label>Daily goal (glasses) <input type="number" id="pref-goal" min="1" max="20" value="{{GOAL}}" /></label>
      <label>Theme
        <select id="pref-theme">
          <option value="light">Light</option>
          <option value="dark">Dark</option>
        </select>
      </label>
      <button type="button" id="pref-save">Save preferences</button>
      <div class="status" id="pref-status"></div>
    </section>

    <section class="card screen hidden" id="screen-account">
      <h2>Account</h2>
      <input id="acc-name" placeholder="Name" />
      <input id="acc-surname" placeholder="Surname" />
      <input id="acc-email" type="email" placeholder="Email" />
      <div class="row">
        <button type="button" id="acc-save">Save changes</button>
        <button class="danger" type="button" id="acc-delete">Delete account</button>
      </div>
      <div class="status" id="acc-status"></div>
    </section>
  </main>

  <script>
    const $ = (id) => document.getElementById(id);
    let goal = {{GOAL}};
    let historyView = 'month';
    let historyAnchor = $('date').value;

    const setStatus = (id, message, type) => {
      $(id).textContent = message;
      $(id).dataset.type = type || '';
    };

    const api = async (method, url, body) => {
      const res = await fetch(url, {
        method,
        headers: body ? { 'content-type': 'application/json' } : {},
        body: body ? JSON.stringify(body) : undefined
      });
      const data = await res.json().catch(() => ({}));
      if (res.status === 401) {
        window.location.reload();
      }
      if (!res.ok) {
        const detail = Object.values(data.fields || {})[0];
        throw new Error(detail || data.error || 'Request failed');
      }
      return data;
    };

    const shiftDate = (iso, days) => {
      const date = new Date(`${iso}T00:00:00Z`);
      date.setUTCDate(date.getUTCDate() + days);
      return date.toISOString().slice(0, 10);
    };

    const showCount = (data) => {
      goal = data.goal;
      $('count').textContent = data.count;
      $('fill').style.width = `${data.progress.percent}%`;
      $('fill').classList.toggle('met', data.progress.goal_met);
      $('remaining').textContent = data.progress.goal_met
        ? 'Goal reached'
        : `${data.progress.remaining} glasses to go`;
    };

    const loadCount = async () => {
      showCount(await api('GET', `/api/count?date=${$('date').value}`));
    };

    const change = async (delta) => {
      try {
        showCount(await api('POST', '/api/count', { date: $('date').value, delta }));
      } catch (err) {
        setStatus('home-status', err.message, 'error');
      }
    };

    document.querySelectorAll('form[action^="/count/"]').forEach((form) => {
      form.addEventListener('submit', (event) => {
        event.preventDefault();
        change(form.action.endsWith('increment') ? 1 : -1);
      });
    });

    $('reset').addEventListener('click', async () => {
      if (!window.confirm('Reset the count for this day?')) {
        return;
      }
      try {
        showCount(await api('POST', '/api/count/reset', { date: $('date').value, confirm: true }));
      } catch (err) {
        setStatus('home-status', err.message, 'error');
      }
    });

    const setDate = (iso) => {
      $('date').value = iso;
      loadCount().catch((err) => setStatus('home-status', err.message, 'error'));
    };

    $('prev-day').addEventListener('click', () => setDate(shiftDate($('date').value, -1)));
    $('next-day').addEventListener('click', () => setDate(shiftDate($('date').value, 1)));
    $('today').addEventListener('click', () => setDate('{{DATE}}'));
    $('date').addEventListener('change', () => setDate($('date').value));

    const renderChart = (series) => {
      const width = 600;
      const height = 260;
      const pad = 30;
      const max = Math.max(series.goal, ...series.days.map((d) => d.count), 1);
      const slot = (width - pad * 2) / series.days.length;
      const barWidth = Math.max(slot * 0.6, 2);
      const y = (value) => height - pad - (value / max) * (height - pad * 2);

      const bars = series.days.map((day, i) => {
        const x = pad + i * slot + (slot - barWidth) / 2;
        const label = series.view === 'month' && day.day % 5 !== 0 ? '' : day.day;
        return `<rect class="bar${day.goal_met ? ' met' : ''}" x="${x}" y="${y(day.count)}" width="${barWidth}" height="${height - pad - y(day.count)}" rx="4"><title>${day.date}: ${day.count}</title></rect>`
          + `<text class="chart-label" x="${x + barWidth / 2}" y="${height - pad + 16}" text-anchor="middle">${label}</text>`;
      }).join('');

      const goalY = y(series.goal);
      $('chart').innerHTML = `${bars}
        <line class="goal-line" x1="${pad}" x2="${width - pad}" y1="${goalY}" y2="${goalY}" />
        <text class="chart-label" x="${pad - 6}" y="${goalY + 4}" text-anchor="end">${series.goal}</text>`;
    };

    const renderRecords = (list) => {
      $('records').innerHTML = list.records.map((entry) => `
        <div class="record">
          <span>${entry.label}</span>
          <div>
            <div>${entry.count}/${entry.goal} glasses</div>
            <div class="progress-bar"><div class="progress-fill${entry.percent >= 100 ? ' met' : ''}" style="width: ${entry.percent}%"></div></div>
          </div>
        </div>`).join('');
      setStatus('history-status', list.message || '', '');
    };

    const loadHistory = async () => {
      const series = await api('GET', `/api/history?view=${historyView}&date=${historyAnchor}`);
      $('history-title').textContent = series.title;
      $('history-prev').dataset.date = series.previous;
      $('history-next').dataset.date = series.next;
      $('history-view').textContent = historyView === 'month' ? 'Show week' : 'Show month';
      renderChart(series);
      renderRecords(await api('GET', '/api/history/records'));
    };

    const refreshHistory = () => loadHistory().catch((err) => setStatus('history-status', err.message, 'error'));

    $('history-prev').addEventListener('click', () => { historyAnchor = $('history-prev').dataset.date; refreshHistory(); });
    $('history-next').addEventListener('click', () => { historyAnchor = $('history-next').dataset.date; refreshHistory(); });
    $('history-view').addEventListener('click', () => {
      historyView = historyView === 'month' ? 'week' : 'month';
      refreshHistory();
    });

    const loadPreferences = async () => {
      const prefs = await api('GET', '/api/preferences');
      $('pref-goal').value = prefs.goal;
      $('pref-theme').value = prefs.theme;
    };

    $('pref-save').addEventListener('click', async () => {
      try {
        const prefs = await api('PUT', '/api/preferences', {
          goal: parseInt($('pref-goal').value, 10),
          theme: $('pref-theme').value
        });
        goal = prefs.goal;
        document.body.className = prefs.theme;
        setStatus('pref-status', 'Preferences saved', 'ok');
      } catch (err) {
        setStatus('pref-status', err.message, 'error');
      }
    });

    const loadAccount = async () => {
      const account = await api('GET', '/api/account');
      $('acc-name').value = account.name;
      $('acc-surname').value = account.surname;
      $('acc-email').value = account.email;
    };

    $('acc-save').addEventListener('click', async () => {
      try {
        await api('PUT', '/api/account', {
          name: $('acc-name').value,
          surname: $('acc-surname').value,
          email: $('acc-email').value
        });
        setStatus('acc-status', 'Changes saved', 'ok');
      } catch (err) {
        setStatus('acc-status', err.message, 'error');
      }
    });

    $('acc-delete').addEventListener('click', async () => {
      if (!window.confirm('Delete your account and all your data?')) {
        return;
      }
      const password = window.prompt('Enter your password to delete the account:');
      if (!password) {
        setStatus('acc-status', 'Your password is required to delete the account.', 'error');
        return;
      }
      try {
        await api('DELETE', '/api/account', { password, confirm: true });
        window.alert('Account deleted');
        window.location.href = '/';
      } catch (err) {
        setStatus('acc-status', err.message, 'error');
      }
    });

    $('logout-btn').addEventListener('click', async () => {
      await api('POST', '/api/auth/logout').catch(() => {});
      window.location.href = '/';
    });

    const loaders = {
      home: loadCount,
      history: loadHistory,
      preferences: loadPreferences,
      account: loadAccount
    };

    document.querySelectorAll('nav button[data-screen]').forEach((button) => {
      button.addEventListener('click', () => {
        const screen = button.dataset.screen;
        document.querySelectorAll('.screen').forEach((el) => {
          el.classList.toggle('hidden', el.id !== `screen-${screen}`);
        });
        loaders[screen]().catch((err) => setStatus(`${screen === 'preferences' ? 'pref' : screen === 'account' ? 'acc' : screen}-status`, err.message, 'error'));
      });
    });

    $('pref-theme').value = '{{THEME}}';
    $('fill').classList.toggle('met', {{COUNT}} >= goal);
  </script>
</body>
</html>
"#;
