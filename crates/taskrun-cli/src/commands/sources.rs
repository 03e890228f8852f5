use crate::dispatch::SOURCES;

pub async fn run() -> anyhow::Result<()> {
    println!("{:<15} {}", "NAME", "DESCRIPTION");
    println!("{}", "-".repeat(60));
    for (name, description) in SOURCES {
        println!("{:<15} {}", name, description);
    }
    Ok(())
}
