//! Check command implementation.
//!
//! Validates configuration and that the configured tool can be launched.

use std::path::Path;

use herakles_gpu_sampler::command::tokenize_with_limit;
use herakles_gpu_sampler::command::MAX_ARGUMENTS;

use crate::config::{validate_effective_config, Config};

/// Validates configuration and tool availability.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles GPU Sampler - System Check");
    println!("======================================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check the tool binary
    println!("\n🛠️  Checking tool command...");
    let argv = tokenize_with_limit(
        config.command(),
        config.max_arguments.unwrap_or(MAX_ARGUMENTS),
    );
    match argv.first() {
        None => {
            println!("   ❌ Command is empty");
            all_ok = false;
        }
        Some(program) => match which::which(program) {
            Ok(path) => {
                println!("   ✅ '{}' found at {}", program, path.display());
                println!("   ✅ {} argument(s): {}", argv.len() - 1, argv[1..].join(" "));
            }
            Err(e) => {
                println!("   ❌ '{}' not found: {}", program, e);
                all_ok = false;
            }
        },
    }

    // Check for GPU device nodes
    println!("\n🎮 Checking GPU devices...");
    if Path::new("/dev/dri").exists() {
        println!("   ✅ /dev/dri present");
    } else {
        println!("   ⚠️  /dev/dri not found - the tool may not see any GPU");
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - sampler is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
