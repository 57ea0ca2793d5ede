use bar_optimizer::packer::Packer;
use bar_optimizer::render;
use bar_optimizer::scenario::{ScenarioGenerator, check_catalog};
use bar_optimizer::types::{self, Bar, Demand, StockBar};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Parser)]
#[command(name = "bar_optimizer", about = "1D bar cutting stock optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack demanded pieces onto bars already in stock
    Pack {
        /// Available bars as length:qty (e.g. 6000:4 3000:2)
        #[arg(long = "bars", num_args = 1.., required = true)]
        bars: Vec<String>,

        /// Demanded pieces as length:qty (e.g. 2100:3 450:8)
        #[arg(long = "cuts", num_args = 1.., required = true)]
        cuts: Vec<String>,

        /// Blade kerf width in mm (default: 0)
        #[arg(long, default_value_t = 0.0)]
        kerf: f64,

        /// RNG seed for a reproducible layout
        #[arg(long)]
        seed: Option<u64>,

        /// Bar prices as length=price (e.g. 6000=28.50)
        #[arg(long = "costs", num_args = 1..)]
        costs: Vec<String>,

        /// Show ASCII layout of each bar
        #[arg(long)]
        layout: bool,
    },
    /// Rank purchase scenarios against a catalog of order lengths
    Scenarios {
        /// Catalog bar lengths in mm (e.g. 3000 6000 12000)
        #[arg(long = "catalog", num_args = 1.., required = true)]
        catalog: Vec<f64>,

        /// Demanded pieces as length:qty (e.g. 2100:3 450:8)
        #[arg(long = "cuts", num_args = 1.., required = true)]
        cuts: Vec<String>,

        /// Blade kerf width in mm (default: 0)
        #[arg(long, default_value_t = 0.0)]
        kerf: f64,

        /// Bar prices as length=price (e.g. 6000=28.50)
        #[arg(long = "costs", num_args = 1..)]
        costs: Vec<String>,

        /// Show ASCII layout of each bar
        #[arg(long)]
        layout: bool,
    },
}

fn parse_entry(s: &str) -> Result<(f64, u32), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("invalid entry '{}', expected length:qty", s));
    }
    let length = parts[0]
        .parse::<f64>()
        .map_err(|_| format!("invalid length in '{}'", s))?;
    let qty = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    if !length.is_finite() || length <= 0.0 {
        return Err(format!("length must be positive in '{}'", s));
    }
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    Ok((length, qty))
}

fn parse_cost(s: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split('=').collect();
    if parts.len() != 2 {
        return Err(format!("invalid cost '{}', expected length=price", s));
    }
    let length = parts[0]
        .parse::<f64>()
        .map_err(|_| format!("invalid length in '{}'", s))?;
    let price = parts[1]
        .parse::<f64>()
        .map_err(|_| format!("invalid price in '{}'", s))?;
    if !price.is_finite() || price < 0.0 {
        return Err(format!("price must be non-negative in '{}'", s));
    }
    Ok((length, price))
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Pack {
            bars,
            cuts,
            kerf,
            seed,
            costs,
            layout,
        } => run_pack(&bars, &cuts, kerf, seed, &costs, layout),
        Command::Scenarios {
            catalog,
            cuts,
            kerf,
            costs,
            layout,
        } => run_scenarios(catalog, &cuts, kerf, &costs, layout),
    }
}

fn run_pack(
    bars: &[String],
    cuts: &[String],
    kerf: f64,
    seed: Option<u64>,
    costs: &[String],
    layout: bool,
) {
    let stock: Vec<StockBar> = bars
        .iter()
        .map(|s| parse_entry(s).map(|(length, qty)| StockBar { length, qty }))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let demands: Vec<Demand> = cuts
        .iter()
        .map(|s| parse_entry(s).map(|(length, qty)| Demand { length, qty }))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let costs: Vec<(f64, f64)> = costs
        .iter()
        .map(|s| parse_cost(s))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    // Validate all pieces fit the longest bar before packing
    let longest = stock.iter().map(|s| s.length).fold(0.0, f64::max);
    for d in &demands {
        if d.length > longest {
            eprintln!(
                "Error: piece {}mm does not fit any available bar (longest: {}mm)",
                d.length, longest
            );
            std::process::exit(1);
        }
    }

    let packer = Packer::new(stock, kerf);
    let result = match seed {
        Some(seed) => packer.pack_with_rng(&demands, &mut SmallRng::seed_from_u64(seed)),
        None => packer.pack(&demands),
    };
    let packed = result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    for (i, bar) in packed.iter().enumerate() {
        print_bar(i, bar, "");
        if layout {
            print!("{}", render::render_bar(bar, kerf));
        }
    }

    println!();
    println!(
        "Summary: {} bar{} used, {}mm waste ({:.1}%)",
        packed.len(),
        if packed.len() == 1 { "" } else { "s" },
        types::total_waste(&packed),
        types::waste_percent(&packed),
    );
    if !costs.is_empty() {
        println!(
            "Cost: {:.2} for whole bars, {:.2} for material used",
            types::total_cost(&packed, &costs),
            types::effective_cost(&packed, &costs),
        );
    }
}

fn run_scenarios(catalog: Vec<f64>, cuts: &[String], kerf: f64, costs: &[String], layout: bool) {
    let demands: Vec<Demand> = cuts
        .iter()
        .map(|s| parse_entry(s).map(|(length, qty)| Demand { length, qty }))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let costs: Vec<(f64, f64)> = costs
        .iter()
        .map(|s| parse_cost(s))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    check_catalog(&catalog).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    // Validate all pieces fit the longest catalog length before running
    let longest = catalog.iter().copied().fold(0.0, f64::max);
    for d in &demands {
        if d.length > longest {
            eprintln!(
                "Error: piece {}mm does not fit any catalog length (longest: {}mm)",
                d.length, longest
            );
            std::process::exit(1);
        }
    }

    let cost_table = if costs.is_empty() { None } else { Some(costs) };
    let generator = ScenarioGenerator::new(catalog, kerf, cost_table);
    let scenarios = generator.generate(&demands).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    for (i, s) in scenarios.iter().enumerate() {
        let order: Vec<String> = s
            .demand
            .iter()
            .map(|(length, count)| format!("{} x {}mm", count, length))
            .collect();
        print!(
            "Scenario {}: {} | {} bar{}, waste {}mm",
            i + 1,
            order.join(" + "),
            s.bar_count,
            if s.bar_count == 1 { "" } else { "s" },
            s.total_waste,
        );
        if let Some(cost) = s.total_cost {
            print!(", cost {:.2}", cost);
        }
        println!();

        let offcuts: Vec<String> = s
            .offcuts
            .iter()
            .filter(|&&o| o > 0.0)
            .map(|o| format!("{}mm", o))
            .collect();
        if !offcuts.is_empty() {
            println!("  Offcuts: {}", offcuts.join(", "));
        }

        for (bi, bar) in s.bars.iter().enumerate() {
            print_bar(bi, bar, "  ");
            if layout {
                print!("{}", render::render_bar(bar, kerf));
            }
        }
        println!();
    }
}

fn print_bar(index: usize, bar: &Bar, indent: &str) {
    let cuts: Vec<String> = bar.cuts.iter().map(|c| c.to_string()).collect();
    println!(
        "{}Bar {} ({}mm): {} | {} cut{}, waste {}mm",
        indent,
        index + 1,
        bar.length,
        cuts.join(" + "),
        bar.cut_count(),
        if bar.cut_count() == 1 { "" } else { "s" },
        bar.waste(),
    );
}
