pub mod assemble;
pub mod dictionary;
pub mod grammar;
pub mod trace;
pub mod triphone;
