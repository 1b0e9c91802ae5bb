//! Login, logout, and whoami handlers.

use std::io::BufRead;

use dialoguer::Input;
use secrecy::SecretString;
use serde::Serialize;

use aquila_core::{Hub, Route, SessionStatus};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct WhoAmI<'a> {
    profile: &'a str,
    user: &'a str,
    display_name: &'a str,
    route: Route,
}

pub async fn login(hub: &Hub, args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let user = match args.user {
        Some(user) => user,
        None => Input::<String>::new()
            .with_prompt("User")
            .interact_text()
            .map_err(util::prompt_err)?,
    };

    let password = if let Some(password) = args.password {
        password
    } else if args.password_stdin {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line.trim_end_matches(['\r', '\n']).to_owned()
    } else {
        rpassword::prompt_password("Password: ").map_err(util::prompt_err)?
    };

    let state = hub
        .session()
        .login(&user, &SecretString::from(password))
        .await?;

    let name = match state.session {
        SessionStatus::LoggedIn { ref display_name } => display_name.as_str(),
        SessionStatus::LoggedOut => user.as_str(),
    };
    let color = output::should_color(&global.color);
    let msg = if color {
        use owo_colors::OwoColorize;
        format!("Welcome, {}", name.bold())
    } else {
        format!("Welcome, {name}")
    };
    output::print_output(&msg, global.quiet);
    Ok(())
}

pub fn logout(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    let was_authenticated = hub.credentials().is_authenticated();
    hub.session().logout();
    let msg = if was_authenticated {
        "Logged out"
    } else {
        "No session to clear"
    };
    output::print_output(msg, global.quiet);
    Ok(())
}

pub fn whoami(hub: &Hub, profile: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let state = hub.navigator().navigate(Route::HOME_PATH);
    let SessionStatus::LoggedIn { ref display_name } = state.session else {
        return Err(CliError::NotLoggedIn {
            profile: profile.to_owned(),
        });
    };

    let creds = hub.credentials().get();
    let info = WhoAmI {
        profile,
        user: creds.user_name().unwrap_or_default(),
        display_name,
        route: state.route,
    };
    let out = output::render_single(
        &global.output,
        &info,
        |w| {
            output::detail(&[
                ("Profile", w.profile.to_owned()),
                ("User", w.user.to_owned()),
                ("Name", w.display_name.to_owned()),
            ])
        },
        |w| w.display_name.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
