use lsqbridge_engine::solvers::lm::LevenbergMarquardt;
use lsqbridge_engine::solvers::numeric_diff::NumericDiffOptions;

/// Fit y = a * exp(b * t) with a numeric Jacobian.
fn main() {
    let samples: Vec<(f64, f64)> = (0..10)
        .map(|i| {
            let t = i as f64 * 0.2;
            (t, 2.0 * (0.7 * t).exp())
        })
        .collect();

    let mut x = vec![1.0, 0.0];
    let result = LevenbergMarquardt::default().solve_numeric_diff(
        samples.len(),
        &mut x,
        |p, r| {
            for (ri, (t, y)) in r.iter_mut().zip(&samples) {
                *ri = p[0] * (p[1] * t).exp() - y;
            }
            true
        },
        NumericDiffOptions::default(),
        |_x| {},
    );

    println!("{}", result.full_report());
    println!("a={:.6} b={:.6}", x[0], x[1]);
}
