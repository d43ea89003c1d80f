fn main() {
    println!("svmetrics-rs - Somatic variant call validation");
    println!();
    println!("🔬 Main tool:");
    println!("  svmetrics   - Sensitivity/specificity of VCF/BCF calls against expected mutations");
    println!();
    println!("📋 Project data tools:");
    println!("  list_files  - List samples, files by type, or file counts of a project");
    println!("  fetch_files - Download project files from object storage");
    println!();
    println!("📖 For help with each tool:");
    println!("  cargo run --bin svmetrics -- --help");
    println!("  cargo run --bin list_files -- --help");
    println!("  cargo run --bin fetch_files -- --help");
    println!();
    println!("🚀 Quick start example:");
    println!("  cargo run --bin svmetrics -- --project bpa-melanoma --data-dir data/ \\");
    println!("      --metadata-json metadata.json --baseline normal.vcf --plot metrics.png");
}
