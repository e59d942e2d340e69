//! Built-in tool implementations for Ferrite.
//!
//! Tools give the agent the ability to interact with the world: run shell
//! commands, read/write files, do math, and search the web.
//!
//! Security defaults:
//! - Shell: only common safe commands (ls, cat, echo, git, pwd, etc.)
//! - File read/write: sensitive paths (~/.ssh, /etc/shadow, etc.) are blocked

pub mod calculator;
pub mod file_read;
pub mod file_write;
pub mod path_guard;
pub mod shell;
pub mod web_search;

use ferrite_core::tool::{Tool, ToolRegistry};

pub use calculator::CalculatorTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use shell::ShellTool;
pub use web_search::WebSearchTool;

/// Shell commands considered safe enough to enable by default.
pub fn safe_commands() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "echo", "pwd", "date", "whoami", "wc", "grep", "find",
        "which", "git", "cargo", "rustc", "node", "npm", "python", "pip", "uname",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Create a registry with all built-in tools and the default safety policy.
pub fn default_registry() -> ToolRegistry {
    registry_with(safe_commands(), path_guard::default_forbidden())
}

/// Create a registry with an explicit shell allowlist and forbidden paths.
pub fn registry_with(allowed_commands: Vec<String>, forbidden_paths: Vec<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let commands = allowed_commands.clone();
    let read_forbidden = forbidden_paths.clone();
    let write_forbidden = forbidden_paths;

    registry
        .register(move || Box::new(ShellTool::new(commands.clone())) as Box<dyn Tool>)
        .expect("builtin tool names are distinct");
    registry
        .register(move || Box::new(FileReadTool::new(read_forbidden.clone())) as Box<dyn Tool>)
        .expect("builtin tool names are distinct");
    registry
        .register(move || Box::new(FileWriteTool::new(write_forbidden.clone())) as Box<dyn Tool>)
        .expect("builtin tool names are distinct");
    registry
        .register(|| Box::new(CalculatorTool) as Box<dyn Tool>)
        .expect("builtin tool names are distinct");
    registry
        .register(|| Box::new(WebSearchTool) as Box<dyn Tool>)
        .expect("builtin tool names are distinct");

    registry
}
