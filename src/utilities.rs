use std::io::{self, BufRead, Write};

/// Ask a yes/no question on stdout and read the answer from stdin. Anything but an explicit yes
/// is a no, including a closed stdin.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", prompt);
    // Flush stdout to get on same line as prompt.
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(is_yes(&input))
}

pub fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
