mod aliases;
mod blocks;
mod conditionals;
mod macros;
mod mls;
mod optionals;
mod orders;
mod scenarios;
