use crate::types::{
    Bar, Demand, Error, Result, Scenario, check_demands, check_kerf, cost_of, total_waste,
};

// Offcut classification for the long-offcut strategy, in mm.
const REUSABLE_OFFCUT_MIN: f64 = 500.0;
const NEGLIGIBLE_OFFCUT_MAX: f64 = 100.0;

// Search bounds for the baseline strategy's new-bar simulation.
const NEW_BAR_CANDIDATES: usize = 3;
const MAX_EXTRA_PIECES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Strategy {
    MinWaste,
    PreferLength(f64),
    MinBars,
    LongOffcuts,
}

pub struct ScenarioGenerator {
    catalog: Vec<f64>,
    kerf: f64,
    costs: Option<Vec<(f64, f64)>>,
}

impl ScenarioGenerator {
    pub fn new(mut catalog: Vec<f64>, kerf: f64, costs: Option<Vec<(f64, f64)>>) -> Self {
        catalog.sort_by(f64::total_cmp);
        catalog.dedup();
        Self {
            catalog,
            kerf,
            costs,
        }
    }

    pub fn generate(&self, demands: &[Demand]) -> Result<Vec<Scenario>> {
        check_demands(demands)?;
        check_kerf(self.kerf)?;
        check_catalog(&self.catalog)?;

        let pieces = expand_sorted(demands);
        tracing::debug!(
            pieces = pieces.len(),
            catalog = self.catalog.len(),
            kerf = self.kerf,
            "generating purchase scenarios"
        );

        let mut scenarios: Vec<Scenario> = Vec::new();

        // Baseline strategy; when it cannot place a piece neither can any
        // other, and the whole generation fails.
        let longest = self.catalog.last().copied().unwrap_or(0.0);
        let baseline =
            self.run(&pieces, Strategy::MinWaste)
                .ok_or_else(|| Error::UnsatisfiableRequirement {
                    piece: pieces.first().copied().unwrap_or(0.0),
                    longest,
                })?;
        self.keep(&mut scenarios, baseline, Strategy::MinWaste);

        for &length in self.catalog.iter().rev() {
            if let Some(bars) = self.run(&pieces, Strategy::PreferLength(length)) {
                self.keep(&mut scenarios, bars, Strategy::PreferLength(length));
            }
        }
        if let Some(bars) = self.run(&pieces, Strategy::MinBars) {
            self.keep(&mut scenarios, bars, Strategy::MinBars);
        }
        if let Some(bars) = self.run(&pieces, Strategy::LongOffcuts) {
            self.keep(&mut scenarios, bars, Strategy::LongOffcuts);
        }

        scenarios.sort_by(|a, b| {
            a.total_waste
                .total_cmp(&b.total_waste)
                .then(a.bar_count.cmp(&b.bar_count))
        });
        Ok(scenarios)
    }

    fn keep(&self, scenarios: &mut Vec<Scenario>, bars: Vec<Bar>, strategy: Strategy) {
        let scenario = self.build_scenario(bars);
        if scenarios.iter().any(|s| s.demand == scenario.demand) {
            tracing::debug!(strategy = ?strategy, "duplicate scenario dropped");
            return;
        }
        tracing::debug!(
            strategy = ?strategy,
            bars = scenario.bar_count,
            waste = scenario.total_waste,
            "scenario kept"
        );
        scenarios.push(scenario);
    }

    // Shared placement loop: repeatedly place the first unplaced piece on
    // an open bar, or open a fresh catalog bar (possibly committing more
    // pieces to it at once). Returns None when no catalog length can hold
    // the piece at hand.
    fn run(&self, pieces: &[f64], strategy: Strategy) -> Option<Vec<Bar>> {
        let mut bars: Vec<Bar> = Vec::new();
        let mut used = vec![false; pieces.len()];
        let mut placed = 0;

        while placed < pieces.len() {
            let idx = match used.iter().position(|u| !u) {
                Some(i) => i,
                None => break,
            };
            let piece = pieces[idx];

            if let Some(bi) = self.choose_open_bar(&bars, piece, strategy) {
                bars[bi].assign(piece, self.kerf);
                used[idx] = true;
                placed += 1;
            } else {
                let (length, indices) = self.open_new_bar(pieces, &used, idx, strategy)?;
                let mut bar = Bar::new(length);
                for &i in &indices {
                    bar.assign(pieces[i], self.kerf);
                    used[i] = true;
                    placed += 1;
                }
                bars.push(bar);
            }
        }
        Some(bars)
    }

    fn choose_open_bar(&self, bars: &[Bar], piece: f64, strategy: Strategy) -> Option<usize> {
        match strategy {
            Strategy::MinWaste => {
                let mut best: Option<(usize, f64)> = None;
                for (i, bar) in bars.iter().enumerate() {
                    if !bar.fits(piece) {
                        continue;
                    }
                    let leftover = bar.remaining - piece - self.kerf;
                    if best.is_none() || leftover < best.map_or(f64::INFINITY, |(_, l)| l) {
                        best = Some((i, leftover));
                        if leftover == 0.0 {
                            break;
                        }
                    }
                }
                best.map(|(i, _)| i)
            }
            Strategy::PreferLength(pref) => {
                let mut best: Option<(usize, f64)> = None;
                let mut best_preferred = false;
                for (i, bar) in bars.iter().enumerate() {
                    if !bar.fits(piece) {
                        continue;
                    }
                    let preferred = bar.length == pref;
                    let leftover = bar.remaining - piece - self.kerf;
                    let better = match best {
                        None => true,
                        Some((_, best_leftover)) => {
                            if preferred != best_preferred {
                                preferred
                            } else {
                                leftover < best_leftover
                            }
                        }
                    };
                    if better {
                        best = Some((i, leftover));
                        best_preferred = preferred;
                    }
                }
                best.map(|(i, _)| i)
            }
            Strategy::MinBars => {
                // Longest bar first, then the tightest fit on it
                let mut best: Option<(usize, f64, f64)> = None;
                for (i, bar) in bars.iter().enumerate() {
                    if !bar.fits(piece) {
                        continue;
                    }
                    let after = bar.remaining - piece;
                    let better = match best {
                        None => true,
                        Some((_, best_len, best_after)) => {
                            bar.length > best_len || (bar.length == best_len && after < best_after)
                        }
                    };
                    if better {
                        best = Some((i, bar.length, after));
                    }
                }
                best.map(|(i, _, _)| i)
            }
            Strategy::LongOffcuts => {
                let mut best: Option<(usize, u8)> = None;
                for (i, bar) in bars.iter().enumerate() {
                    if !bar.fits(piece) {
                        continue;
                    }
                    let tier = offcut_tier(bar.remaining - piece - self.kerf);
                    if best.is_none() || tier < best.map_or(u8::MAX, |(_, t)| t) {
                        best = Some((i, tier));
                    }
                }
                best.map(|(i, _)| i)
            }
        }
    }

    // Picks the catalog length for a fresh bar plus the piece indices
    // committed to it (always including `idx`).
    fn open_new_bar(
        &self,
        pieces: &[f64],
        used: &[bool],
        idx: usize,
        strategy: Strategy,
    ) -> Option<(f64, Vec<usize>)> {
        let piece = pieces[idx];
        match strategy {
            Strategy::MinWaste => {
                let mut best: Option<(f64, f64, Vec<usize>)> = None;
                for &length in self
                    .catalog
                    .iter()
                    .filter(|&&l| piece <= l)
                    .take(NEW_BAR_CANDIDATES)
                {
                    let (space, indices) = self.fill(pieces, used, idx, length, MAX_EXTRA_PIECES);
                    let better = match &best {
                        None => true,
                        Some((best_space, _, _)) => space < *best_space,
                    };
                    if better {
                        best = Some((space, length, indices));
                    }
                }
                best.map(|(_, length, indices)| (length, indices))
            }
            Strategy::PreferLength(pref) => {
                let length = if piece <= pref {
                    pref
                } else {
                    self.catalog
                        .iter()
                        .copied()
                        .find(|&l| l != pref && piece <= l)?
                };
                let (_, indices) = self.fill(pieces, used, idx, length, usize::MAX);
                Some((length, indices))
            }
            Strategy::MinBars => {
                let length = self.catalog.iter().rev().copied().find(|&l| piece <= l)?;
                let (_, indices) = self.fill(pieces, used, idx, length, usize::MAX);
                Some((length, indices))
            }
            Strategy::LongOffcuts => {
                // Try every compatible length; favor ones whose leftover
                // is big enough to reuse, otherwise the tightest fit.
                let mut best: Option<(f64, f64, Vec<usize>)> = None;
                for &length in self.catalog.iter().filter(|&&l| piece <= l) {
                    let (space, indices) = self.fill(pieces, used, idx, length, usize::MAX);
                    let score = if space > REUSABLE_OFFCUT_MIN {
                        space
                    } else {
                        -space
                    };
                    let better = match &best {
                        None => true,
                        Some((best_score, _, _)) => score > *best_score,
                    };
                    if better {
                        best = Some((score, length, indices));
                    }
                }
                best.map(|(_, length, indices)| (length, indices))
            }
        }
    }

    // Greedy fill simulation on a fresh bar of `length`: cut `idx`, then
    // keep adding further unplaced pieces in order while they fit, up to
    // `max_extra` of them. Returns the raw final space and the committed
    // indices.
    fn fill(
        &self,
        pieces: &[f64],
        used: &[bool],
        idx: usize,
        length: f64,
        max_extra: usize,
    ) -> (f64, Vec<usize>) {
        let mut space = length - pieces[idx] - self.kerf;
        let mut indices = vec![idx];
        for (i, &p) in pieces.iter().enumerate() {
            if indices.len() - 1 >= max_extra {
                break;
            }
            if used[i] || i == idx || p > space {
                continue;
            }
            space -= p + self.kerf;
            indices.push(i);
        }
        (space, indices)
    }

    fn build_scenario(&self, bars: Vec<Bar>) -> Scenario {
        let mut demand: Vec<(f64, u32)> = Vec::new();
        for bar in &bars {
            match demand.iter_mut().find(|(l, _)| *l == bar.length) {
                Some(e) => e.1 += 1,
                None => demand.push((bar.length, 1)),
            }
        }
        demand.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut offcuts: Vec<f64> = bars.iter().map(|b| b.waste()).collect();
        offcuts.sort_by(|a, b| b.total_cmp(a));

        let total_cost = self.costs.as_ref().map(|costs| {
            demand
                .iter()
                .map(|(l, n)| cost_of(costs, *l) * *n as f64)
                .sum()
        });

        Scenario {
            bar_count: bars.len(),
            total_waste: total_waste(&bars),
            demand,
            offcuts,
            bars,
            total_cost,
        }
    }
}

/// Validates a list of purchasable bar lengths.
pub fn check_catalog(catalog: &[f64]) -> Result<()> {
    if catalog.is_empty() {
        return Err(Error::InvalidInput(
            "catalog must contain at least one bar length".into(),
        ));
    }
    for &l in catalog {
        if !l.is_finite() || l <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "catalog length must be positive, got {}",
                l
            )));
        }
    }
    Ok(())
}

pub fn generate_scenarios(
    demands: &[Demand],
    catalog: &[f64],
    kerf: f64,
    costs: Option<&[(f64, f64)]>,
) -> Result<Vec<Scenario>> {
    ScenarioGenerator::new(catalog.to_vec(), kerf, costs.map(|c| c.to_vec())).generate(demands)
}

fn offcut_tier(leftover: f64) -> u8 {
    if leftover > REUSABLE_OFFCUT_MIN {
        0
    } else if leftover < NEGLIGIBLE_OFFCUT_MAX {
        1
    } else {
        2
    }
}

fn expand_sorted(demands: &[Demand]) -> Vec<f64> {
    let mut pieces: Vec<f64> = Vec::new();
    for d in demands {
        for _ in 0..d.qty {
            pieces.push(d.length);
        }
    }
    pieces.sort_by(|a, b| b.total_cmp(a));
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(catalog: &[f64], kerf: f64) -> ScenarioGenerator {
        ScenarioGenerator::new(catalog.to_vec(), kerf, None)
    }

    fn demands(items: &[(u32, f64)]) -> Vec<Demand> {
        items
            .iter()
            .map(|&(qty, length)| Demand { length, qty })
            .collect()
    }

    /// Validates a scenario list end to end: each scenario's summary
    /// fields agree with its bars, each cuts exactly the demanded pieces,
    /// no demand mapping repeats, and total waste ascends through the
    /// ranking.
    fn assert_scenarios_valid(scenarios: &[Scenario], demands: &[Demand], kerf: f64) {
        assert!(!scenarios.is_empty());

        for (si, s) in scenarios.iter().enumerate() {
            assert_eq!(s.bar_count, s.bars.len(), "scenario {si}: bar count");

            let waste_sum: f64 = s.bars.iter().map(|b| b.waste()).sum();
            assert!(
                (s.total_waste - waste_sum).abs() < 1e-9,
                "scenario {si}: total waste {} != sum {}",
                s.total_waste,
                waste_sum
            );

            let mut offcuts: Vec<f64> = s.bars.iter().map(|b| b.waste()).collect();
            offcuts.sort_by(|a, b| b.total_cmp(a));
            assert_eq!(s.offcuts, offcuts, "scenario {si}: offcut list");

            let mapped: u32 = s.demand.iter().map(|(_, c)| c).sum();
            assert_eq!(mapped as usize, s.bars.len(), "scenario {si}: demand total");
            for &(length, count) in &s.demand {
                let actual = s.bars.iter().filter(|b| b.length == length).count() as u32;
                assert_eq!(actual, count, "scenario {si}: bars of {length}");
            }

            for (bi, bar) in s.bars.iter().enumerate() {
                let used: f64 = bar.cuts.iter().sum();
                let expected = (bar.length - used - kerf * bar.cuts.len() as f64).max(0.0);
                assert!(
                    (bar.waste() - expected).abs() < 1e-9,
                    "scenario {si}, bar {bi}: waste {} != expected {}",
                    bar.waste(),
                    expected
                );
            }

            let mut cut: Vec<f64> = s.bars.iter().flat_map(|b| b.cuts.iter().copied()).collect();
            let mut want: Vec<f64> = demands
                .iter()
                .flat_map(|d| std::iter::repeat(d.length).take(d.qty as usize))
                .collect();
            cut.sort_by(f64::total_cmp);
            want.sort_by(f64::total_cmp);
            assert_eq!(cut, want, "scenario {si}: cut pieces differ from demand");
        }

        for i in 0..scenarios.len() {
            for j in (i + 1)..scenarios.len() {
                assert_ne!(
                    scenarios[i].demand, scenarios[j].demand,
                    "scenarios {i} and {j} share a demand mapping"
                );
            }
        }

        for pair in scenarios.windows(2) {
            assert!(
                pair[0].total_waste <= pair[1].total_waste,
                "ranking not ascending by waste"
            );
        }
    }

    #[test]
    fn test_single_length_catalog() {
        let demands = demands(&[(4, 1200.0)]);
        let scenarios = generator(&[2500.0], 0.0).generate(&demands).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 0.0);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].demand, vec![(2500.0, 2)]);
        assert_eq!(scenarios[0].total_waste, 200.0);
    }

    #[test]
    fn test_exact_fit_leaves_zero_waste() {
        // 1500 + 3 + 1497 consumes the 3000 bar exactly
        let demands = demands(&[(1, 1500.0), (1, 1497.0)]);
        let scenarios = generator(&[3000.0], 3.0).generate(&demands).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 3.0);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].bar_count, 1);
        assert_eq!(scenarios[0].total_waste, 0.0);
        assert_eq!(scenarios[0].bars[0].waste(), 0.0);
    }

    #[test]
    fn test_equal_waste_ranked_by_bar_count() {
        // One 6000 bar and two 3000 bars both waste 200; the single bar
        // purchase must rank first
        let demands = demands(&[(2, 2900.0)]);
        let scenarios = generator(&[3000.0, 6000.0], 0.0).generate(&demands).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 0.0);
        assert_eq!(scenarios.len(), 3);
        assert_eq!(scenarios[0].demand, vec![(6000.0, 1)]);
        assert_eq!(scenarios[0].total_waste, 200.0);
        assert_eq!(scenarios[1].demand, vec![(3000.0, 2)]);
        assert_eq!(scenarios[1].total_waste, 200.0);
        assert_eq!(scenarios[2].demand, vec![(6000.0, 1), (3000.0, 1)]);
        assert_eq!(scenarios[2].total_waste, 3200.0);
    }

    #[test]
    fn test_long_bar_alternative_offered() {
        let demands = demands(&[(2, 1400.0)]);
        let scenarios = generator(&[3000.0, 6000.0], 0.0).generate(&demands).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 0.0);
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].demand, vec![(3000.0, 1)]);
        assert_eq!(scenarios[0].total_waste, 200.0);
        assert_eq!(scenarios[1].demand, vec![(6000.0, 1)]);
        assert_eq!(scenarios[1].total_waste, 3200.0);
    }

    #[test]
    fn test_mixed_length_purchase_found() {
        let demands = demands(&[(3, 1400.0)]);
        let scenarios = generator(&[3000.0, 4500.0], 0.0).generate(&demands).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 0.0);
        assert_eq!(scenarios.len(), 3);
        // All three on one 4500 bar wastes only 300
        assert_eq!(scenarios[0].demand, vec![(4500.0, 1)]);
        assert_eq!(scenarios[0].total_waste, 300.0);
        assert_eq!(scenarios[1].demand, vec![(3000.0, 2)]);
        assert_eq!(scenarios[2].demand, vec![(4500.0, 1), (3000.0, 1)]);
    }

    #[test]
    fn test_unsatisfiable_piece() {
        let demands = demands(&[(1, 7000.0)]);
        let err = generator(&[3000.0, 6000.0], 0.0).generate(&demands).unwrap_err();
        assert_eq!(
            err,
            Error::UnsatisfiableRequirement {
                piece: 7000.0,
                longest: 6000.0
            }
        );
    }

    #[test]
    fn test_deterministic() {
        let demands = demands(&[(4, 2100.0), (3, 1800.0), (6, 1200.0), (5, 450.0)]);
        let g = generator(&[3000.0, 6000.0, 12000.0], 4.0);
        let a = g.generate(&demands).unwrap();
        let b = g.generate(&demands).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_realistic_batch() {
        let demands = demands(&[(4, 2100.0), (3, 1800.0), (6, 1200.0), (5, 450.0)]);
        let catalog = [3000.0, 6000.0, 12000.0];
        let scenarios = generator(&catalog, 4.0).generate(&demands).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 4.0);
        // Distinct mappings cannot outnumber the baseline, one preferred
        // run per length, and the long-offcut run
        assert!(scenarios.len() <= 2 + catalog.len());
    }

    #[test]
    fn test_costs_applied() {
        let demands = demands(&[(2, 2900.0)]);
        let costs = vec![(3000.0, 10.0), (6000.0, 18.0)];
        let scenarios = ScenarioGenerator::new(vec![3000.0, 6000.0], 0.0, Some(costs))
            .generate(&demands)
            .unwrap();
        assert_eq!(scenarios[0].total_cost, Some(18.0));
        assert_eq!(scenarios[1].total_cost, Some(20.0));
        assert_eq!(scenarios[2].total_cost, Some(28.0));
    }

    #[test]
    fn test_missing_cost_prices_at_zero() {
        let demands = demands(&[(2, 2900.0)]);
        let costs = vec![(3000.0, 10.0)];
        let scenarios = ScenarioGenerator::new(vec![3000.0, 6000.0], 0.0, Some(costs))
            .generate(&demands)
            .unwrap();
        assert_eq!(scenarios[0].demand, vec![(6000.0, 1)]);
        assert_eq!(scenarios[0].total_cost, Some(0.0));
        assert_eq!(scenarios[1].total_cost, Some(20.0));
    }

    #[test]
    fn test_generate_scenarios_helper() {
        let demands = demands(&[(2, 1200.0)]);
        let scenarios =
            generate_scenarios(&demands, &[3000.0], 0.0, Some(&[(3000.0, 12.5)])).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 0.0);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].demand, vec![(3000.0, 1)]);
        assert_eq!(scenarios[0].total_waste, 600.0);
        assert_eq!(scenarios[0].total_cost, Some(12.5));
    }

    #[test]
    fn test_no_cost_table_gives_none() {
        let demands = demands(&[(1, 1000.0)]);
        let scenarios = generator(&[3000.0], 0.0).generate(&demands).unwrap();
        assert_eq!(scenarios[0].total_cost, None);
    }

    #[test]
    fn test_empty_demands() {
        let scenarios = generator(&[3000.0], 0.0).generate(&[]).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert!(scenarios[0].bars.is_empty());
        assert!(scenarios[0].demand.is_empty());
        assert_eq!(scenarios[0].total_waste, 0.0);
    }

    #[test]
    fn test_duplicate_catalog_lengths_collapse() {
        let demands = demands(&[(1, 1000.0)]);
        let scenarios = generator(&[3000.0, 3000.0], 0.0).generate(&demands).unwrap();
        assert_scenarios_valid(&scenarios, &demands, 0.0);
        assert_eq!(scenarios.len(), 1);
    }

    #[test]
    fn test_rejects_empty_catalog() {
        let err = generator(&[], 0.0)
            .generate(&demands(&[(1, 1000.0)]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_nonpositive_catalog_length() {
        let err = generator(&[3000.0, -5.0], 0.0)
            .generate(&demands(&[(1, 1000.0)]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(check_catalog(&[0.0]).is_err());
        assert!(check_catalog(&[3000.0]).is_ok());
    }

    #[test]
    fn test_rejects_negative_kerf() {
        let err = generator(&[3000.0], -2.0)
            .generate(&demands(&[(1, 1000.0)]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_offcut_tiers() {
        assert_eq!(offcut_tier(800.0), 0);
        assert_eq!(offcut_tier(500.0), 2);
        assert_eq!(offcut_tier(250.0), 2);
        assert_eq!(offcut_tier(100.0), 2);
        assert_eq!(offcut_tier(50.0), 1);
        assert_eq!(offcut_tier(-3.0), 1);
    }
}
