pub const GITIGNORE: &str = "# tally local state
.tally/
";
