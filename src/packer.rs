use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::types::{Bar, Demand, Error, Result, StockBar, check_demands, check_kerf, total_waste};

pub struct Packer {
    stock: Vec<StockBar>,
    kerf: f64,
}

impl Packer {
    pub fn new(stock: Vec<StockBar>, kerf: f64) -> Self {
        Self { stock, kerf }
    }

    pub fn pack(&self, demands: &[Demand]) -> Result<Vec<Bar>> {
        self.pack_with_rng(demands, &mut SmallRng::from_os_rng())
    }

    pub fn pack_with_rng(&self, demands: &[Demand], rng: &mut impl Rng) -> Result<Vec<Bar>> {
        check_demands(demands)?;
        check_kerf(self.kerf)?;
        self.check_stock()?;

        let pieces = expand_pieces(demands, rng);
        if pieces.is_empty() {
            return Ok(vec![]);
        }

        let mut pool = Pool::new(&self.stock);
        let mut bars: Vec<Bar> = Vec::new();

        tracing::debug!(
            pieces = pieces.len(),
            stock_units = pool.total_units(),
            kerf = self.kerf,
            "packing onto fixed stock"
        );

        for &piece in &pieces {
            let open: Vec<usize> = bars
                .iter()
                .enumerate()
                .filter(|(_, b)| b.fits(piece))
                .map(|(i, _)| i)
                .collect();

            if let Some(&bi) = open.choose(rng) {
                bars[bi].assign(piece, self.kerf);
            } else {
                let length = pool.take_smallest(piece)?;
                let mut bar = Bar::new(length);
                bar.assign(piece, self.kerf);
                bars.push(bar);
            }
        }

        tracing::debug!(
            bars = bars.len(),
            waste = total_waste(&bars),
            "packing complete"
        );

        Ok(bars)
    }

    fn check_stock(&self) -> Result<()> {
        for s in &self.stock {
            if !s.length.is_finite() || s.length <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "bar length must be positive, got {}",
                    s.length
                )));
            }
            if s.qty == 0 {
                return Err(Error::InvalidInput(format!(
                    "bar quantity must be non-zero for length {}",
                    s.length
                )));
            }
        }
        Ok(())
    }
}

pub fn pack_fixed_stock(stock: &[StockBar], demands: &[Demand], kerf: f64) -> Result<Vec<Bar>> {
    Packer::new(stock.to_vec(), kerf).pack(demands)
}

/// Finite stock as length -> remaining unit count, shortest length first.
struct Pool {
    entries: Vec<(f64, u32)>,
}

impl Pool {
    fn new(stock: &[StockBar]) -> Self {
        let mut entries: Vec<(f64, u32)> = Vec::new();
        for s in stock {
            match entries.iter_mut().find(|(l, _)| *l == s.length) {
                Some(e) => e.1 += s.qty,
                None => entries.push((s.length, s.qty)),
            }
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { entries }
    }

    fn total_units(&self) -> u32 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    fn longest_available(&self) -> Option<f64> {
        self.entries
            .iter()
            .rev()
            .find(|(_, c)| *c > 0)
            .map(|(l, _)| *l)
    }

    // Removes one unit of the smallest length that can hold the piece.
    fn take_smallest(&mut self, piece: f64) -> Result<f64> {
        if let Some(e) = self
            .entries
            .iter_mut()
            .find(|(l, c)| *c > 0 && piece <= *l)
        {
            e.1 -= 1;
            return Ok(e.0);
        }
        match self.longest_available() {
            None => Err(Error::StockExhausted { piece }),
            Some(longest) => Err(Error::NoCompatibleBar { piece, longest }),
        }
    }
}

fn expand_pieces(demands: &[Demand], rng: &mut impl Rng) -> Vec<f64> {
    let mut all: Vec<f64> = Vec::new();
    for d in demands {
        for _ in 0..d.qty {
            all.push(d.length);
        }
    }
    all.sort_by(|a, b| b.total_cmp(a));

    // Group by exact length, longest first
    let mut groups: Vec<(f64, u32)> = Vec::new();
    for &len in &all {
        match groups.last_mut() {
            Some(g) if g.0 == len => g.1 += 1,
            _ => groups.push((len, 1)),
        }
    }

    // Shuffle lengths within each 10% cluster so equally viable orderings
    // vary between runs; pieces of one length stay adjacent.
    let mut ordered = Vec::with_capacity(all.len());
    let mut i = 0;
    while i < groups.len() {
        let anchor = groups[i].0;
        let mut j = i + 1;
        while j < groups.len() && groups[j].0 >= anchor * 0.9 {
            j += 1;
        }
        groups[i..j].shuffle(rng);
        for &(len, count) in &groups[i..j] {
            for _ in 0..count {
                ordered.push(len);
            }
        }
        i = j;
    }
    ordered
}
