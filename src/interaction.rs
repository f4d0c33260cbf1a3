//! User prompts used by interactive skip policies and runnables.

use anyhow::{Result, bail};
use std::io::{self, BufRead, Write};

pub trait UserPrompt: Send + Sync {
    /// Ask a yes/no question
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    /// Ask the user to pick one of `options`, returning its index
    fn choose(&self, message: &str, options: &[String], default: usize) -> Result<usize>;
}

/// Answers every prompt with its default
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompt;

impl UserPrompt for NonInteractivePrompt {
    fn confirm(&self, _message: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn choose(&self, _message: &str, options: &[String], default: usize) -> Result<usize> {
        if default >= options.len() {
            bail!("Default choice {} out of range", default);
        }
        Ok(default)
    }
}

/// Prompts on stdout and reads answers from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl UserPrompt for ConsolePrompt {
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            print!("{} {} ", message, hint);
            io::stdout().flush()?;
            match parse_confirmation(&self.read_line()?, default) {
                Some(answer) => return Ok(answer),
                None => println!("Please answer 'y' or 'n'."),
            }
        }
    }

    fn choose(&self, message: &str, options: &[String], default: usize) -> Result<usize> {
        if default >= options.len() {
            bail!("Default choice {} out of range", default);
        }
        println!("{}", message);
        for (index, option) in options.iter().enumerate() {
            println!("  {}. {}", index + 1, option);
        }
        loop {
            print!("Choice [{}]: ", default + 1);
            io::stdout().flush()?;
            match parse_choice(&self.read_line()?, options.len(), default) {
                Some(choice) => return Ok(choice),
                None => println!("Please enter a number between 1 and {}.", options.len()),
            }
        }
    }
}

fn parse_confirmation(answer: &str, default: bool) -> Option<bool> {
    match answer.to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

fn parse_choice(answer: &str, count: usize, default: usize) -> Option<usize> {
    if answer.is_empty() {
        return Some(default);
    }
    match answer.parse::<usize>() {
        Ok(choice) if (1..=count).contains(&choice) => Some(choice - 1),
        _ => None,
    }
}
