use z3::ast::Int;
use z3::{Config, Context};

pub fn default_config() -> Config {
    Config::new()
}

pub fn zero(ctx: &Context) -> Int<'_> {
    Int::from_i64(ctx, 0)
}

pub fn one(ctx: &Context) -> Int<'_> {
    Int::from_i64(ctx, 1)
}
