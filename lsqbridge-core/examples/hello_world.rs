use lsqbridge::SolverOption;

fn main() -> Result<(), lsqbridge::AdjustError> {
    let mut params = vec![0.5];
    lsqbridge::adjust(
        &mut params,
        1,
        |x, r| {
            r[0] = 0.5 * (10.0 - x[0]).powi(2);
            Ok(())
        },
        &[SolverOption::VerboseOutput(true)],
    )?;
    println!("x: 0.5 -> {:.6}", params[0]);
    Ok(())
}
