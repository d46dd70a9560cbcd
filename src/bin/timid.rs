use liars_dice::strategy::{run_stdio, Timid};

fn main() -> anyhow::Result<()> {
    run_stdio(Timid)
}
