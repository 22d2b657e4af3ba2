use lsqbridge::SolverOption;

/// Fit a circle (cx, cy, radius) to noisy points, keeping the radius positive.
fn main() -> Result<(), lsqbridge::AdjustError> {
    let points: Vec<(f64, f64)> = (0..12)
        .map(|k| {
            let t = k as f64 * std::f64::consts::TAU / 12.0;
            let noise = 0.01 * ((k * 7) % 5) as f64 - 0.02;
            (1.0 + (2.0 + noise) * t.cos(), -0.5 + (2.0 + noise) * t.sin())
        })
        .collect();
    let num_residuals = points.len();

    let mut params = vec![0.0, 0.0, 1.0];
    lsqbridge::adjust(
        &mut params,
        num_residuals,
        move |p, r| {
            for (ri, (x, y)) in r.iter_mut().zip(&points) {
                *ri = (x - p[0]).hypot(y - p[1]) - p[2];
            }
            Ok(())
        },
        &[SolverOption::LowerBound(2, 1e-3)],
    )?;

    println!(
        "center=({:.4}, {:.4}) radius={:.4}",
        params[0], params[1], params[2]
    );
    Ok(())
}
