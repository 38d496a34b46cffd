use moonlapse_core::config::GameConfig;

fn main() {
    let config = serdeconv::to_toml_string(&GameConfig::default()).expect("Failed to generate config file");

    println!("{}", config);
}
