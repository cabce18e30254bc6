// File: src/repl.rs
//
// Interactive REPL (spec §4.M): a rustyline-backed loop over a
// persistent root namespace, reading one top-level form at a time and
// printing its value, with multi-line continuation while delimiters
// are unbalanced.

use crate::namespace::Namespace;
use crate::value::Value;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub struct Repl {
    ns: Namespace,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        Ok(Repl { ns: crate::bootstrap::root(), editor })
    }

    fn show_banner(&self) {
        println!("{}", "ale REPL".bright_cyan().bold());
        println!(
            "  {} use {}{}{}",
            "Welcome!".bright_green(),
            ":help".bright_yellow(),
            " for commands, ".bright_blue(),
            ":quit".bright_yellow()
        );
        println!();
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.show_banner();
        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() { "ale> ".bright_green().to_string() } else { "...> ".bright_blue().to_string() };

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());

                    if buffer.is_empty() && line.trim().starts_with(':') {
                        if self.handle_command(line.trim()) {
                            continue;
                        } else {
                            break;
                        }
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');

                    if is_balanced(&buffer) {
                        self.eval_buffer(&buffer);
                        buffer.clear();
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C (Ctrl+C to interrupt, :quit to exit)".bright_yellow());
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {err}", "Error:".bright_red());
                    break;
                }
            }
        }

        Ok(())
    }

    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":help" | ":h" => {
                self.show_help();
                true
            }
            ":quit" | ":q" => {
                println!("{}", "Goodbye!".bright_cyan());
                false
            }
            ":reset" | ":r" => {
                self.ns = crate::bootstrap::root();
                println!("{}", "Namespace reset".bright_green());
                true
            }
            _ => {
                println!("{} unknown command {}. Type {} for help.", "Error:".bright_red(), cmd.bright_yellow(), ":help".bright_yellow());
                true
            }
        }
    }

    fn show_help(&self) {
        println!();
        println!("{}", "Commands:".bright_cyan().bold());
        println!("  {}  show this message", ":help or :h".bright_yellow());
        println!("  {}  exit the REPL", ":quit or :q".bright_yellow());
        println!("  {}  reset the namespace", ":reset or :r".bright_yellow());
        println!();
    }

    fn eval_buffer(&mut self, src: &str) {
        if src.trim().is_empty() {
            return;
        }
        match crate::reader::read(src) {
            Ok(forms) => {
                let forms: Vec<Value> = forms.iter().collect();
                for form in forms {
                    match crate::eval::eval_value(&self.ns, form) {
                        Ok(v) => println!("{} {}", "=>".bright_blue(), v.print()),
                        Err(e) => eprintln!("{e}"),
                    }
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
}

/// A buffer is ready to evaluate once every paren/bracket/brace is
/// balanced outside of a string literal.
fn is_balanced(src: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for ch in src.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => depth += 1,
            ')' | ']' | '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    !in_string && depth <= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbalanced_parens_need_continuation() {
        assert!(!is_balanced("(+ 1 2"));
        assert!(is_balanced("(+ 1 2)"));
    }

    #[test]
    fn strings_do_not_confuse_bracket_counting() {
        assert!(is_balanced("(str \"(\")"));
    }
}
