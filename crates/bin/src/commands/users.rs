//! User administration commands.

use credstore::{CredentialStore, NewUser, OpContext, flows};

use crate::backend::{flush, op_context, open_store};
use crate::cli::{ConnectArgs, CreateArgs, UsersCommand};
use crate::output::{OutputFormat, print_users, user_json};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Run a `users` subcommand
pub async fn run(args: &ConnectArgs, command: &UsersCommand, format: OutputFormat) -> CmdResult {
    if command.writes() {
        tracing::warn!(
            "Writing the users table directly; a process serving this table will overwrite the change"
        );
    }
    let store = open_store(args).await?;
    let ctx = op_context(args);

    match command {
        UsersCommand::List => {
            let users = store.list().await;
            print_users(&users, store.now(), format)?;
        }
        UsersCommand::Show { email } => {
            let user = store.load(email).await?;
            match format {
                OutputFormat::Human => print_users(&[user], store.now(), format)?,
                OutputFormat::Json => println!("{}", serde_json::to_string(&user_json(&user))?),
            }
        }
        UsersCommand::Create(create) => {
            create_user(&store, &ctx, create, format).await?;
        }
        UsersCommand::SetRole { email, role } => {
            let (user, ()) = store
                .update(&ctx, email, |user| {
                    user.role = role.clone();
                    Ok(())
                })
                .await?;
            report(format, "role updated", &user)?;
        }
        UsersCommand::Confirm { email } => {
            let (user, ()) = store
                .update(&ctx, email, |user| {
                    user.confirmed = true;
                    user.clear_confirmation();
                    Ok(())
                })
                .await?;
            report(format, "confirmed", &user)?;
        }
        UsersCommand::Unlock { email } => {
            let mut user = store.load(email).await?;
            flows::lock::record_success(&store, &ctx, &mut user).await?;
            report(format, "unlocked", &user)?;
        }
    }

    flush(&store, args).await
}

async fn create_user(
    store: &CredentialStore,
    ctx: &OpContext,
    create: &CreateArgs,
    format: OutputFormat,
) -> CmdResult {
    let new_user = NewUser::new(&create.email)
        .name(&create.name)
        .role(&create.role)
        .password(&create.password_hash);

    if create.confirmed {
        let mut user = store.create(new_user).await?;
        user.confirmed = true;
        store.save(ctx, &user).await?;
        return report(format, "created", &user);
    }

    let (user, token) = flows::register(store, ctx, new_user).await?;
    match format {
        OutputFormat::Human => {
            println!("{}: created", user.email());
            println!("Confirmation token: {token}");
        }
        OutputFormat::Json => {
            let mut value = user_json(&user);
            value["confirmation_token"] = serde_json::Value::String(token);
            println!("{}", serde_json::to_string(&value)?);
        }
    }
    Ok(())
}

fn report(format: OutputFormat, what: &str, user: &credstore::User) -> CmdResult {
    match format {
        OutputFormat::Human => println!("{}: {what}", user.email()),
        OutputFormat::Json => println!("{}", serde_json::to_string(&user_json(user))?),
    }
    Ok(())
}
