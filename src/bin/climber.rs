use liars_dice::strategy::{run_stdio, MinimumRaise};

fn main() -> anyhow::Result<()> {
    run_stdio(MinimumRaise)
}
