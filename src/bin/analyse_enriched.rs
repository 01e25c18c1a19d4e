//! Analyse an enriched tree table
//!
//! Prints descriptive statistics, correlations and the largest species and
//! address groups, then writes the group tables as CSV.
//!
//! Usage:
//!   cargo run --bin analyse_enriched -- [data/arbres_enriched.csv] [data]

use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tree_scorer_rust::analysis::{complete_rows, correlation_matrix, describe, group_stats, numeric_column, overview, STAT_COLUMNS};
use tree_scorer_rust::export::{batch_from_dataframe, read_enriched_csv, write_csv};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tree_scorer_rust=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().unwrap_or_else(|| "data/arbres_enriched.csv".to_string()));
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));

    let df = read_enriched_csv(&input)?;
    let batch = batch_from_dataframe(&df)?;
    let summary = overview(&batch);

    println!("\n{}", "=".repeat(70));
    println!("Enriched table: {}", input.display());
    println!("{}", "=".repeat(70));
    println!("Total trees:     {}", summary.total_trees);
    println!("Unique species:  {}", summary.unique_species);
    if let Some(mean) = summary.mean_size {
        println!("Mean size:       {:.2}", mean);
    }
    if let Some(species) = &summary.rarest_species {
        println!("Rarest species:  {}", species);
    }
    println!("Clusters:        {} ({} noise points)", batch.n_clusters, batch.n_noise);

    println!("\nDescriptive statistics:");
    println!(
        "{:<20} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    let columns: Vec<Vec<Option<f64>>> = STAT_COLUMNS
        .iter()
        .map(|name| numeric_column(&df, name))
        .collect::<anyhow::Result<_>>()?;
    for (name, values) in STAT_COLUMNS.iter().zip(&columns) {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if let Some(d) = describe(&present) {
            println!(
                "{:<20} {:>8} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
                name, d.count, d.mean, d.std, d.min, d.q25, d.median, d.q75, d.max
            );
        }
    }

    println!("\nCorrelation matrix:");
    let paired = complete_rows(&columns);
    let slices: Vec<&[f64]> = paired.iter().map(|c| c.as_slice()).collect();
    let matrix = correlation_matrix(&slices);
    print!("{:<20}", "");
    for name in STAT_COLUMNS {
        print!(" {:>18}", name);
    }
    println!();
    for (name, row) in STAT_COLUMNS.iter().zip(&matrix) {
        print!("{:<20}", name);
        for value in row {
            print!(" {:>18.4}", value);
        }
        println!();
    }

    let by_species = group_stats(&df, "species", None)?;
    println!("\nTop 5 species by tree count:");
    println!("{}", by_species.head(Some(5)));

    let by_address = group_stats(&df, "address", None)?;
    println!("\nAddresses with the most trees:");
    println!("{}", by_address.head(Some(10)));

    std::fs::create_dir_all(&out_dir)?;
    let species_path = out_dir.join("stats_by_species.csv");
    let address_path = out_dir.join("stats_by_address.csv");
    write_csv(&by_species, &species_path)?;
    write_csv(&by_address, &address_path)?;
    tracing::info!("Wrote {:?} and {:?}", species_path, address_path);

    Ok(())
}
