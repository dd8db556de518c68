pub mod diamond;
pub mod scoreboard;
