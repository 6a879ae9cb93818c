//! Resolve an application path through the navigation guard.

use zdrink_client::{GuardDecision, Zdrink};

use super::print_line;

pub fn open(app: &Zdrink, path: &str) {
    match app.guard().check(path) {
        GuardDecision::Proceed(resolved) => {
            print_line(format_args!(
                "{} ({})",
                resolved.route.title, resolved.route.name
            ));
            for (name, value) in &resolved.params {
                print_line(format_args!("  {name} = {value}"));
            }
        }
        GuardDecision::Redirect { to, redirect } => {
            tracing::info!(%redirect, "Sign-in required");
            print_line(format_args!("-> {to}"));
        }
    }
}
