// build.rs

use clap::{Arg, ArgAction, ArgGroup, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("raypm")
        .version(env!("CARGO_PKG_VERSION"))
        .author("raypm Contributors")
        .about("Source package manager for raylib projects")
        .arg(
            Arg::new("list")
                .long("list")
                .action(ArgAction::SetTrue)
                .help("List all available packages"),
        )
        .arg(
            Arg::new("sync")
                .long("sync")
                .action(ArgAction::SetTrue)
                .help("Get the latest package index"),
        )
        .arg(
            Arg::new("build")
                .long("build")
                .value_name("PACKAGE")
                .help("Build a package without installing it"),
        )
        .arg(
            Arg::new("info")
                .long("info")
                .value_name("PACKAGE")
                .help("Show information about a package"),
        )
        .arg(
            Arg::new("install")
                .long("install")
                .value_name("PACKAGE")
                .help("Install a package and its dependencies"),
        )
        .arg(
            Arg::new("remove")
                .long("remove")
                .value_name("PACKAGE")
                .help("Remove a package"),
        )
        .arg(
            Arg::new("clean")
                .long("clean")
                .value_name("SCOPE")
                .value_parser(["cache", "all"])
                .help("Clean raypm's storage"),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                .help("Generate shell completion scripts"),
        )
        .group(
            ArgGroup::new("operation")
                .required(true)
                .args(["list", "sync", "build", "info", "install", "remove", "clean", "completions"]),
        )
        .arg(
            Arg::new("target")
                .long("target")
                .value_name("OS")
                .help("Target system (linux, windows, android); defaults to the host"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .default_value(".raypm")
                .help("Root directory for packages, cache and database"),
        )
        .arg(
            Arg::new("pkgs")
                .long("pkgs")
                .value_name("PATH")
                .help("Custom package descriptors directory"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Print debug logs"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("raypm.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
