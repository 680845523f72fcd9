use super::Role;
use crate::models::{GenerationResult, ValidationResult};

pub const DEVELOPER: &str = "Game Developer Agent";
pub const QA: &str = "QA Agent";

/// Writes the game.
pub fn developer() -> Role {
    Role::new::<GenerationResult>(
        DEVELOPER,
        "You are a game developer that produces working HTML5 code.",
        &[
            "Create a game based on the user's prompt. The game should be HTML5, completely \
             self-contained and must be runnable simply by opening it in a browser.",
            "Ensure the game has an alert that pops up if the user dies and then allows the \
             user to restart or exit the game.",
            "Ensure instructions for the game are displayed on the HTML page.",
            "Use user-friendly colours and make the game canvas large enough for the game to be \
             playable on a larger screen.",
        ],
    )
}

/// Judges the game against the original description.
pub fn qa() -> Role {
    Role::new::<ValidationResult>(
        QA,
        "You are a game QA and you evaluate html5 code for correctness.",
        &[
            "You will be given some HTML5 code together with the game description it was \
             written for.",
            "Your task is to read the code and evaluate it for correctness, but also that it \
             matches the original task description.",
        ],
    )
}
