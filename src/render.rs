use crate::types::Bar;

const MAX_WIDTH: f64 = 80.0;

pub fn render_bar(bar: &Bar, kerf: f64) -> String {
    if bar.length <= 0.0 {
        return String::new();
    }
    let scale = MAX_WIDTH / bar.length;
    let grid_w = (bar.length * scale).round() as usize;
    if grid_w == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; grid_w + 1]; 3];

    // Bar outline first; any open space on the right is the offcut
    draw_box(&mut grid, 0, grid_w);

    let mut pos = 0.0;
    for &cut in &bar.cuts {
        let sx = (pos * scale).round() as usize;
        let sw = (cut * scale).round() as usize;
        pos += cut + kerf;

        if sw == 0 {
            continue;
        }
        draw_box(&mut grid, sx, sw);

        // Label, centered when it fits
        let label = format!("{}", cut);
        let label_chars: Vec<char> = label.chars().collect();
        if sw > 2 {
            let cx = sx + sw / 2;
            let half = label_chars.len() / 2;
            let start_x = cx.saturating_sub(half);
            for (i, &ch) in label_chars.iter().enumerate() {
                let x = start_x + i;
                if x > sx && x < sx + sw {
                    grid[1][x] = ch;
                }
            }
        }
    }

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

fn draw_box(grid: &mut [Vec<char>], x: usize, w: usize) {
    let cols = grid[0].len();

    for i in x..=x + w {
        if i < cols {
            grid[0][i] = if grid[0][i] == '|' || grid[0][i] == '+' {
                '+'
            } else {
                '-'
            };
            grid[2][i] = if grid[2][i] == '|' || grid[2][i] == '+' {
                '+'
            } else {
                '-'
            };
        }
    }

    for &cx in &[x, x + w] {
        if cx < cols {
            grid[0][cx] = '+';
            grid[1][cx] = '|';
            grid[2][cx] = '+';
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_with_cuts(length: f64, cuts: &[f64], kerf: f64) -> Bar {
        let mut bar = Bar::new(length);
        for &c in cuts {
            bar.assign(c, kerf);
        }
        bar
    }

    #[test]
    fn test_render_single_cut() {
        let bar = bar_with_cuts(100.0, &[60.0], 0.0);
        let output = render_bar(&bar, 0.0);
        assert!(output.contains('+'));
        assert!(output.contains('-'));
        assert!(output.contains('|'));
        assert!(output.contains("60"));
    }

    #[test]
    fn test_render_two_cuts() {
        let bar = bar_with_cuts(3000.0, &[1200.0, 900.0], 3.0);
        let output = render_bar(&bar, 3.0);
        assert!(output.contains("1200"));
        assert!(output.contains("900"));
    }

    #[test]
    fn test_render_empty_bar() {
        let bar = Bar::new(100.0);
        let output = render_bar(&bar, 0.0);
        // Still draws the bar outline
        assert!(output.contains('+'));
        assert_eq!(output.lines().count(), 3);
    }
}
