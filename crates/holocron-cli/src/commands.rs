//! Parsing for the interactive browser's line commands.

/// One line of input in the browser loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Page(u32),
    /// An empty term clears the search
    Search(String),
    /// `None` lists the options
    Species(Option<usize>),
    /// `None` lists the options
    Homeworld(Option<usize>),
    Clear,
    Show(usize),
    List,
    Status,
    Logout,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  next | prev | page N     move between pages (only without filters)
  search TEXT              filter by name (search alone clears it)
  species [N]              list species, or filter by option N
  homeworld [N]            list homeworlds, or filter by option N
  clear                    remove all filters
  show N                   details for character N on screen
  list                     redraw the current page
  status                   session status
  logout                   sign out and exit
  quit                     exit (stay signed in)";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" | "list" | "ls" => Ok(Command::List),
            "next" | "n" => Ok(Command::Next),
            "prev" | "p" => Ok(Command::Prev),
            "page" => parse_number(rest, "page").map(|n| Command::Page(n as u32)),
            "search" | "/" => Ok(Command::Search(rest.to_string())),
            "species" => parse_optional(rest, "species").map(Command::Species),
            "homeworld" | "planet" => parse_optional(rest, "homeworld").map(Command::Homeworld),
            "clear" => Ok(Command::Clear),
            "show" => parse_number(rest, "show").map(Command::Show),
            "status" => Ok(Command::Status),
            "logout" => Ok(Command::Logout),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("Unknown command '{}'. Type 'help' for a list.", other)),
        }
    }
}

fn parse_number(arg: &str, command: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 && n <= u32::MAX as usize => Ok(n),
        _ => Err(format!("Usage: {} N (N starts at 1)", command)),
    }
}

fn parse_optional(arg: &str, command: &str) -> Result<Option<usize>, String> {
    if arg.is_empty() {
        Ok(None)
    } else {
        parse_number(arg, command).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigation() {
        assert_eq!(Command::parse("next"), Ok(Command::Next));
        assert_eq!(Command::parse(" P "), Ok(Command::Prev));
        assert_eq!(Command::parse("page 4"), Ok(Command::Page(4)));
        assert_eq!(Command::parse(""), Ok(Command::List));
    }

    #[test]
    fn test_parse_search_keeps_spaces() {
        assert_eq!(
            Command::parse("search  luke sky "),
            Ok(Command::Search("luke sky".to_string()))
        );
        assert_eq!(Command::parse("search"), Ok(Command::Search(String::new())));
    }

    #[test]
    fn test_parse_filters() {
        assert_eq!(Command::parse("species"), Ok(Command::Species(None)));
        assert_eq!(Command::parse("species 2"), Ok(Command::Species(Some(2))));
        assert_eq!(Command::parse("homeworld 1"), Ok(Command::Homeworld(Some(1))));
        assert_eq!(Command::parse("show 3"), Ok(Command::Show(3)));
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        assert!(Command::parse("page 0").is_err());
        assert!(Command::parse("page x").is_err());
        assert!(Command::parse("show").is_err());
        assert!(Command::parse("species -1").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        let err = Command::parse("jump 5").unwrap_err();
        assert!(err.contains("jump"));
    }
}
