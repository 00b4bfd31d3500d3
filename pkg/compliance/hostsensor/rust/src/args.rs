// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Flag lookup over raw command-line tokens as captured from /proc.

/// Returns the value of the flag `name` in `args`.
///
/// Both `--flag value` and `--flag=value` are recognized since real command
/// lines mix styles. The token after `--flag` is its value even when it
/// starts with `-` (e.g. `-` for stdout). A flag that is the last token
/// yields `Some("")`. Tokens that merely share a prefix with `name` are not
/// matches.
pub fn get_arg<'a, S: AsRef<str>>(args: &'a [S], name: &str) -> Option<&'a str> {
    let mut args = args.iter().map(AsRef::<str>::as_ref);

    while let Some(arg) = args.next() {
        if arg == name {
            return Some(args.next().unwrap_or_default());
        }
        if let Some(value) = arg
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(value);
        }
    }

    None
}

/// Joins the tokens with single spaces. Quoting and original spacing are not
/// preserved, the result is for display only.
pub fn raw_cmd<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(AsRef::<str>::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}
