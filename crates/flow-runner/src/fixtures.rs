//! Application fixtures: base URL, routes, UI labels and expected strings.
//!
//! Defaults describe the application as it ships (Portuguese UI served on
//! `http://localhost:3000`). Every field can be overridden from the YAML
//! config; missing fields keep their default.

use crate::errors::FlowError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub base_url: String,
    pub routes: Routes,
    pub labels: Labels,
    pub texts: Texts,
    pub stat: StatFixture,
    pub identity: IdentityFixture,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            routes: Routes::default(),
            labels: Labels::default(),
            texts: Texts::default(),
            stat: StatFixture::default(),
            identity: IdentityFixture::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub signup: String,
    pub login: String,
    /// Authenticated landing route
    pub landing: String,
    pub profile: String,
    pub routes: String,
    pub activity: String,
    pub notifications: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            signup: "/signup".into(),
            login: "/login".into(),
            landing: "/app".into(),
            profile: "/opcoes".into(),
            routes: "/rotas".into(),
            activity: "/atividade".into(),
            notifications: "/notificacoes".into(),
        }
    }
}

impl Routes {
    fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("signup", self.signup.as_str()),
            ("login", self.login.as_str()),
            ("landing", self.landing.as_str()),
            ("profile", self.profile.as_str()),
            ("routes", self.routes.as_str()),
            ("activity", self.activity.as_str()),
            ("notifications", self.notifications.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub create_account: String,
    pub sign_in: String,
    pub sign_out: String,
    pub profile: String,
    pub routes: String,
    pub activity: String,
    pub notes: String,
    pub home: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            name: "Nome".into(),
            email: "Email".into(),
            password: "Senha".into(),
            confirm_password: "Confirmar senha".into(),
            create_account: "Criar conta".into(),
            sign_in: "Entrar".into(),
            sign_out: "Sair".into(),
            profile: "Perfil".into(),
            routes: "Rotas".into(),
            activity: "Atividade".into(),
            notes: "Notas".into(),
            home: "Home".into(),
        }
    }
}

impl Labels {
    fn all(&self) -> [(&'static str, &str); 12] {
        [
            ("labels.name", self.name.as_str()),
            ("labels.email", self.email.as_str()),
            ("labels.password", self.password.as_str()),
            ("labels.confirm_password", self.confirm_password.as_str()),
            ("labels.create_account", self.create_account.as_str()),
            ("labels.sign_in", self.sign_in.as_str()),
            ("labels.sign_out", self.sign_out.as_str()),
            ("labels.profile", self.profile.as_str()),
            ("labels.routes", self.routes.as_str()),
            ("labels.activity", self.activity.as_str()),
            ("labels.notes", self.notes.as_str()),
            ("labels.home", self.home.as_str()),
        ]
    }
}

/// Literal strings the pages render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Texts {
    /// Heading of the unauthenticated landing page
    pub welcome_back: String,
    pub routes_this_month: String,
    pub no_routes: String,
    pub no_activity: String,
    pub no_notifications: String,
}

impl Default for Texts {
    fn default() -> Self {
        Self {
            welcome_back: "Bem-vindo de volta".into(),
            routes_this_month: "Rotas este mês".into(),
            no_routes: "Nenhuma rota encontrada".into(),
            no_activity: "Nenhuma atividade encontrada".into(),
            no_notifications: "Nenhuma notificação".into(),
        }
    }
}

/// Dashboard statistic card: the value element inside the card labelled
/// with `Texts::routes_this_month`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatFixture {
    pub card_selector: String,
    pub value_selector: String,
    pub expected: String,
}

impl Default for StatFixture {
    fn default() -> Self {
        Self {
            card_selector: "div".into(),
            value_selector: "p.text-2xl".into(),
            expected: "0".into(),
        }
    }
}

/// Template the test identity is generated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityFixture {
    pub name: String,
    pub password: String,
    pub email_prefix: String,
    pub email_domain: String,
}

impl Default for IdentityFixture {
    fn default() -> Self {
        Self {
            name: "Test User".into(),
            password: "password123".into(),
            email_prefix: "testuser_".into(),
            email_domain: "example.com".into(),
        }
    }
}

impl Fixtures {
    /// Absolute URL for `path` on the application under test.
    pub fn url(&self, path: &str) -> String {
        resolve_url(&self.base_url, path)
    }

    /// Glob that matches `route` on any origin, e.g. `**/app`.
    pub fn route_glob(route: &str) -> String {
        format!("**{route}")
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(FlowError::InvalidFixture(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        for (key, route) in self.routes.all() {
            if !route.starts_with('/') {
                return Err(FlowError::InvalidFixture(format!(
                    "routes.{key} must start with '/', got '{route}'"
                )));
            }
        }
        let texts = [
            ("texts.welcome_back", &self.texts.welcome_back),
            ("texts.routes_this_month", &self.texts.routes_this_month),
            ("texts.no_routes", &self.texts.no_routes),
            ("texts.no_activity", &self.texts.no_activity),
            ("texts.no_notifications", &self.texts.no_notifications),
            ("stat.card_selector", &self.stat.card_selector),
            ("stat.value_selector", &self.stat.value_selector),
            ("identity.name", &self.identity.name),
            ("identity.password", &self.identity.password),
            ("identity.email_domain", &self.identity.email_domain),
        ];
        for (key, value) in texts
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .chain(self.labels.all())
        {
            if value.trim().is_empty() {
                return Err(FlowError::InvalidFixture(format!("{key} cannot be empty")));
            }
        }
        Ok(())
    }
}

/// Joins `path` onto `base`. Absolute URLs pass through untouched.
pub fn resolve_url(base: &str, path: &str) -> String {
    if path.contains("://") || path.starts_with("about:") || path.starts_with("data:") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
