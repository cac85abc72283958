use std::path::Path;

use cloud_policy_daemon::policy::load_policies;

pub async fn run(policy_file: &Path) -> anyhow::Result<()> {
    println!("Validating policy file {}...\n", policy_file.display());

    let policies = load_policies(policy_file).await?;

    for policy in &policies {
        println!(
            "  {:<24} resourceType={:<20} conditions={} action={}",
            policy.id,
            policy.resource_type,
            policy.conditions.len(),
            policy.remediation_action.kind()
        );
    }

    println!("\n{} polic{} loaded successfully.", policies.len(), if policies.len() == 1 { "y" } else { "ies" });
    Ok(())
}
