#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

use anyhow::Result;
use vergen::EmitBuilder;

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=prompts");
    EmitBuilder::builder().all_build().all_git().emit()?;

    return Ok(());
}
