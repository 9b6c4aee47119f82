use anyhow::Context;

use crate::host::Host;
use crate::output::print_json;

/// Run one reconciliation sweep and report what it did.
pub async fn run(host: &Host, json: bool) -> anyhow::Result<()> {
    let report = host
        .scheduler
        .reconcile()
        .await
        .context("reconciliation failed")?;

    if json {
        print_json(&report)?;
        return Ok(());
    }
    println!(
        "Executed {}, rescheduled {}, ended {}, kept {}",
        report.executed, report.rescheduled, report.ended, report.kept
    );
    if report.duplicates > 0 {
        println!("Dropped {} duplicate entries", report.duplicates);
    }
    if report.execute_failures > 0 || report.arm_failures > 0 {
        println!(
            "Failures: {} could not be opened, {} timers could not be armed",
            report.execute_failures, report.arm_failures
        );
    }
    Ok(())
}
