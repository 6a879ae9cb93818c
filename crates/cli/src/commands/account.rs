//! Account commands.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password may also come from ZDRINK_PASSWORD)
//! zdrink login -u alice -p hunter2
//!
//! # Show the signed-in user
//! zdrink whoami
//!
//! # Sign out, telling the backend too
//! zdrink logout --remote
//! ```

use secrecy::SecretString;
use zdrink_client::{
    LoginCredentials, PasswordChange, ProfileUpdate, Registration, UserIdentity, Zdrink,
};
use zdrink_core::UserType;

use super::{CommandError, print_json, print_line};

/// Sign in and report the identity.
pub async fn login(app: &Zdrink, username: &str, password: String) -> Result<(), CommandError> {
    let identity = app
        .session()
        .login(&LoginCredentials::new(username, password))
        .await?;

    set_sentry_user(&identity);
    print_line(format_args!(
        "Signed in as {}",
        identity.username().unwrap_or(username)
    ));
    Ok(())
}

/// Sign out locally, optionally notifying the backend first.
pub async fn logout(app: &Zdrink, remote: bool) {
    if remote {
        app.session().logout_remote().await;
    }
    app.logout();
    sentry::configure_scope(|scope| scope.set_user(None));
    print_line("Signed out");
}

/// Print the identity fetched at startup.
pub fn whoami(app: &Zdrink) -> Result<(), CommandError> {
    let identity = app.session().identity().ok_or(CommandError::NotSignedIn)?;
    print_json(identity.fields())
}

/// Create an account.
pub async fn register(
    app: &Zdrink,
    username: String,
    password: String,
    email: Option<String>,
    phone: Option<String>,
    user_type: &str,
) -> Result<(), CommandError> {
    let user_type: UserType = user_type.parse().map_err(CommandError::InvalidArgument)?;

    let registration = Registration {
        username,
        password2: password.clone(),
        password,
        email,
        phone,
        user_type,
    };
    let registered = app.session().register(&registration).await?;
    print_line(
        registered
            .message
            .unwrap_or_else(|| "Account created. Run `zdrink login` to sign in.".to_string()),
    );
    Ok(())
}

/// Change the password of the signed-in user.
pub async fn change_password(app: &Zdrink, old: String, new: String) -> Result<(), CommandError> {
    require_session(app)?;
    let change = PasswordChange {
        old_password: SecretString::from(old),
        new_password2: SecretString::from(new.clone()),
        new_password: SecretString::from(new),
    };
    let message = app.session().change_password(&change).await?;
    print_line(message.unwrap_or_else(|| "Password changed".to_string()));
    Ok(())
}

/// Update profile fields and print the merged identity.
pub async fn update_profile(app: &Zdrink, update: ProfileUpdate) -> Result<(), CommandError> {
    require_session(app)?;
    if update.is_empty() {
        return Err(CommandError::InvalidArgument(
            "nothing to update; pass at least one field".to_string(),
        ));
    }
    let identity = app.session().update_identity(&update).await?;
    print_json(identity.fields())
}

/// Exchange the refresh token for a new access token.
pub async fn refresh(app: &Zdrink) -> Result<(), CommandError> {
    require_session(app)?;
    app.session().refresh_credential().await?;
    print_line("Access token refreshed");
    Ok(())
}

pub fn require_session(app: &Zdrink) -> Result<(), CommandError> {
    if app.session().is_authenticated() {
        Ok(())
    } else {
        Err(CommandError::NotSignedIn)
    }
}

/// Attach the signed-in user to Sentry events.
pub fn set_sentry_user(identity: &UserIdentity) {
    let user = sentry::User {
        id: identity.id().map(|id| id.to_string()),
        username: identity.username().map(ToString::to_string),
        ..Default::default()
    };
    sentry::configure_scope(|scope| scope.set_user(Some(user)));
}
