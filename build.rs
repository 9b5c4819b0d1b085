use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct ConfigSection {
    page_size: Option<usize>,
    classes: Option<usize>,
    max_small: Option<usize>,
    header_bytes: Option<usize>,
    objects_per_block_hint: Option<usize>,
    min_block: Option<usize>,
    max_block: Option<usize>,
    large_table_capacity: Option<usize>,
}

#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    config: ConfigSection,
}

struct ResolvedConfig {
    page_size: usize,
    page_shift: u32,
    classes: usize,
    max_small: usize,
    header_bytes: usize,
    objects_per_block_hint: usize,
    min_block: usize,
    max_block: usize,
    large_table_capacity: usize,
}

fn resolve_config(cfg: &ConfigSection) -> ResolvedConfig {
    let page_size = cfg.page_size.unwrap_or(4096);
    assert!(
        page_size > 0 && page_size.is_power_of_two(),
        "page_size ({}) must be a power of 2",
        page_size
    );
    assert!(
        page_size >= 4096,
        "page_size ({}) must be >= 4096",
        page_size
    );

    let classes = cfg.classes.unwrap_or(10);
    let max_small = cfg.max_small.unwrap_or(2048);
    let header_bytes = cfg.header_bytes.unwrap_or(128);
    let objects_per_block_hint = cfg.objects_per_block_hint.unwrap_or(1024);
    let min_block = cfg.min_block.unwrap_or(1 << 14);
    let max_block = cfg.max_block.unwrap_or(1 << 18);
    let large_table_capacity = cfg.large_table_capacity.unwrap_or(1024);

    assert!(classes >= 2 && classes < 32, "classes must be in 2..32");
    assert!(
        max_small == 4usize << (classes - 1),
        "max_small ({}) must equal 4 << (classes - 1) = {}",
        max_small,
        4usize << (classes - 1)
    );
    assert!(
        header_bytes.is_power_of_two() && header_bytes >= 64,
        "header_bytes ({}) must be a power of 2 >= 64",
        header_bytes
    );
    assert!(
        objects_per_block_hint > 0,
        "objects_per_block_hint must be > 0"
    );
    assert!(
        min_block.is_power_of_two() && min_block >= 4 * page_size,
        "min_block ({}) must be a power of 2 and at least 4 pages",
        min_block
    );
    assert!(
        max_block.is_power_of_two() && max_block >= min_block,
        "max_block ({}) must be a power of 2 >= min_block ({})",
        max_block,
        min_block
    );
    // The 4-byte class compresses free-list links to 32 bits; reconstruction
    // from the link word's own high bits requires the block span to stay well
    // inside the 32-bit range.
    assert!(
        max_block <= 1 << 31,
        "max_block ({}) must be <= 2^31 for compressed links",
        max_block
    );
    assert!(
        max_small <= min_block / 2,
        "max_small ({}) must leave room for headers in a min_block ({})",
        max_small,
        min_block
    );
    assert!(
        large_table_capacity > 0 && large_table_capacity < u32::MAX as usize,
        "large_table_capacity ({}) out of range",
        large_table_capacity
    );

    ResolvedConfig {
        page_size,
        page_shift: page_size.trailing_zeros(),
        classes,
        max_small,
        header_bytes,
        objects_per_block_hint,
        min_block,
        max_block,
        large_table_capacity,
    }
}

fn default_config_path() -> String {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    format!("{}/tsmalloc.toml", manifest_dir)
}

fn generate_config(cfg: &ResolvedConfig, out_path: &Path) {
    let code = format!(
        "// Auto-generated by build.rs. Do not edit.\n\n\
         pub const PAGE_SHIFT: usize = {};\n\
         pub const PAGE_SIZE: usize = {};\n\
         pub const CLASS_COUNT: usize = {};\n\
         pub const MAX_SMALL: usize = {};\n\
         pub const HEADER_BYTES: usize = {};\n\
         pub const OBJECTS_PER_BLOCK_HINT: usize = {};\n\
         pub const MIN_BLOCK: usize = {};\n\
         pub const MAX_BLOCK: usize = {};\n\
         pub const LARGE_TABLE_CAPACITY: usize = {};\n",
        cfg.page_shift,
        cfg.page_size,
        cfg.classes,
        cfg.max_small,
        cfg.header_bytes,
        cfg.objects_per_block_hint,
        cfg.min_block,
        cfg.max_block,
        cfg.large_table_capacity,
    );
    fs::write(out_path, code).expect("failed to write config_gen.rs");
}

fn main() {
    println!("cargo:rerun-if-env-changed=TSMALLOC_CONFIG");

    let out_dir = env::var("OUT_DIR").unwrap();

    let config_path = env::var("TSMALLOC_CONFIG").unwrap_or_else(|_| default_config_path());
    println!("cargo:rerun-if-changed={}", config_path);
    let content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", config_path, e));

    let config: Config = toml::from_str(&content).expect("failed to parse TOML config");

    let resolved = resolve_config(&config.config);

    generate_config(&resolved, &Path::new(&out_dir).join("config_gen.rs"));
}
