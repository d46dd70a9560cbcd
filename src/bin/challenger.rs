use liars_dice::strategy::{run_stdio, AlwaysChallenge};

fn main() -> anyhow::Result<()> {
    run_stdio(AlwaysChallenge)
}
