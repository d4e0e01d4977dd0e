use std::error::Error;

use crate::api::UserInfo;
use crate::cli::CliContext;

pub async fn show_user(context: &CliContext) -> Result<(), Box<dyn Error>> {
    let client = context.client()?;
    let response = client.get_user_info().await?;

    match response.data {
        Some(user) => {
            for line in describe_user(&user) {
                println!("{line}");
            }
        }
        None => println!("The server returned no account details."),
    }
    Ok(())
}

fn describe_user(user: &UserInfo) -> Vec<String> {
    let mut lines = vec![format!("👤 {}", display_name(user))];
    let fields = [
        ("ID", user.id.as_str()),
        ("Email", user.email.as_str()),
        ("Role", user.role.as_str()),
        ("Status", user.status.as_str()),
        ("Balance", user.balance.as_str()),
        ("Charged balance", user.charge_balance.as_str()),
        ("Total balance", user.total_balance.as_str()),
    ];
    for (label, value) in fields {
        if !value.is_empty() {
            lines.push(format!("  {label}: {value}"));
        }
    }
    if user.is_admin {
        lines.push("  Administrator".to_string());
    }
    if !user.introduction.is_empty() {
        lines.push(String::new());
        lines.push(format!("  {}", user.introduction));
    }
    lines
}

fn display_name(user: &UserInfo) -> &str {
    if user.name.is_empty() {
        "(unnamed account)"
    } else {
        &user.name
    }
}
