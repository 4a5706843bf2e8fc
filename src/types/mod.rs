pub mod openai;
pub mod x;
