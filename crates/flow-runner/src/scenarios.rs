//! The two acceptance scenarios, built from fixtures and a fresh identity.

use crate::{
    fixtures::Fixtures,
    identity::TestIdentity,
    types::{Flow, FlowStep, Stage},
};
use action_primitives::Locator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bound on URL waits and on expectations that follow a navigation.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Bound on expectations without an explicit timeout.
pub const DEFAULT_ASSERTION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub wait_ms: u64,
    pub assertion_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            wait_ms: DEFAULT_WAIT_TIMEOUT_MS,
            assertion_ms: DEFAULT_ASSERTION_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// register, profile, logout, login, verify profile data
    AuthFlow,
    /// register, dashboard stat, routes/activity/notifications empty states
    InternalPages,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::AuthFlow, Scenario::InternalPages];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::AuthFlow => "auth-flow",
            Scenario::InternalPages => "internal-pages",
        }
    }

    pub fn build(&self, fixtures: &Fixtures, identity: &TestIdentity, timeouts: Timeouts) -> Flow {
        match self {
            Scenario::AuthFlow => auth_flow(fixtures, identity, timeouts),
            Scenario::InternalPages => internal_pages(fixtures, identity, timeouts),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == value)
            .ok_or_else(|| format!("unknown scenario '{value}'"))
    }
}

fn link(name: &str) -> Locator {
    Locator::role("link", name)
}

fn button(name: &str) -> Locator {
    Locator::role("button", name)
}

fn arrive_at(route: &str, timeouts: Timeouts) -> FlowStep {
    FlowStep::wait_for_url(Fixtures::route_glob(route), timeouts.wait_ms)
}

/// Signup form through to the authenticated landing route.
fn registration(fixtures: &Fixtures, identity: &TestIdentity, timeouts: Timeouts) -> Stage {
    let labels = &fixtures.labels;
    Stage::new("Registration")
        .step(FlowStep::goto(&fixtures.routes.signup))
        .step(FlowStep::fill(Locator::label(&labels.name), &identity.name))
        .step(FlowStep::fill(Locator::label(&labels.email), &identity.email))
        // "Confirmar senha" also contains "senha"
        .step(FlowStep::fill_secret(
            Locator::label_exact(&labels.password),
            &identity.password,
        ))
        .step(FlowStep::fill_secret(
            Locator::label(&labels.confirm_password),
            &identity.password,
        ))
        .step(FlowStep::click(button(&labels.create_account)))
        .step(arrive_at(&fixtures.routes.landing, timeouts))
}

fn open_profile(fixtures: &Fixtures, stage: &str, timeouts: Timeouts) -> Stage {
    Stage::new(stage)
        .step(FlowStep::click(link(&fixtures.labels.profile)))
        .step(arrive_at(&fixtures.routes.profile, timeouts))
}

/// Follow a navigation link and check the page shows its empty state.
fn visit(stage: &str, label: &str, route: &str, empty_state: &str, timeouts: Timeouts) -> Stage {
    Stage::new(stage)
        .step(FlowStep::click(link(label)))
        .step(arrive_at(route, timeouts))
        .step(FlowStep::expect_visible(
            Locator::text(empty_state),
            timeouts.assertion_ms,
        ))
}

/// Register, open the profile, log out, log back in and check the profile
/// shows the registered name and email.
pub fn auth_flow(fixtures: &Fixtures, identity: &TestIdentity, timeouts: Timeouts) -> Flow {
    let labels = &fixtures.labels;
    let routes = &fixtures.routes;

    let registration = registration(fixtures, identity, timeouts).step(FlowStep::expect_visible(
        link(&labels.profile),
        timeouts.assertion_ms,
    ));

    let logout = Stage::new("Logout")
        .step(FlowStep::click(button(&labels.sign_out)))
        .step(FlowStep::expect_visible(
            Locator::role("heading", &fixtures.texts.welcome_back),
            timeouts.wait_ms,
        ))
        .step(FlowStep::expect_hidden(link(&labels.profile), timeouts.wait_ms));

    let login = Stage::new("Login")
        .step(FlowStep::goto(&routes.login))
        .step(FlowStep::fill(Locator::label(&labels.email), &identity.email))
        .step(FlowStep::fill_secret(
            Locator::label(&labels.password),
            &identity.password,
        ))
        .step(FlowStep::click(button(&labels.sign_in)))
        .step(arrive_at(&routes.landing, timeouts))
        .step(FlowStep::expect_visible(
            link(&labels.profile),
            timeouts.wait_ms,
        ));

    let profile_data = open_profile(fixtures, "Profile data", timeouts)
        .step(FlowStep::expect_visible(
            Locator::text(&identity.name),
            timeouts.assertion_ms,
        ))
        .step(FlowStep::expect_visible(
            Locator::text(&identity.email),
            timeouts.assertion_ms,
        ));

    Flow::new(Scenario::AuthFlow.name())
        .with_stage(registration)
        .with_stage(open_profile(fixtures, "Profile", timeouts))
        .with_stage(logout)
        .with_stage(login)
        .with_stage(profile_data)
}

/// Register a fresh account and check the dashboard statistic and the empty
/// states of the routes, activity and notifications pages.
pub fn internal_pages(fixtures: &Fixtures, identity: &TestIdentity, timeouts: Timeouts) -> Flow {
    let labels = &fixtures.labels;
    let routes = &fixtures.routes;
    let texts = &fixtures.texts;

    let stat = Locator::css_has_text(&fixtures.stat.card_selector, &texts.routes_this_month)
        .within(&fixtures.stat.value_selector);
    let dashboard = Stage::new("Dashboard").step(FlowStep::expect_text(
        stat,
        &fixtures.stat.expected,
        timeouts.assertion_ms,
    ));

    let home = Stage::new("Home")
        .step(FlowStep::click(link(&labels.home)))
        .step(arrive_at(&routes.landing, timeouts));

    Flow::new(Scenario::InternalPages.name())
        .with_stage(registration(fixtures, identity, timeouts))
        .with_stage(dashboard)
        .with_stage(visit("Routes", &labels.routes, &routes.routes, &texts.no_routes, timeouts))
        .with_stage(visit(
            "Activity",
            &labels.activity,
            &routes.activity,
            &texts.no_activity,
            timeouts,
        ))
        .with_stage(visit(
            "Notifications",
            &labels.notes,
            &routes.notifications,
            &texts.no_notifications,
            timeouts,
        ))
        .with_stage(home)
}
