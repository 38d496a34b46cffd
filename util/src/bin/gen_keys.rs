//! Generates an RSA keypair for the game server to use as its long-lived
//! transport identity, and writes it out as a JSON blob of big-endian
//! integer components.

use clap::{App, Arg};
use moonlapse_proto::crypto::KeyPair;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use serde_derive::Serialize;
use std::fs;

#[derive(Serialize)]
struct KeyFile {
    n: Vec<u8>,
    e: Vec<u8>,
    d: Vec<u8>,
    primes: Vec<Vec<u8>>,
}

fn main() {
    let matches = App::new("Key Generator")
        .version("1.0")
        .about("Generates an RSA keypair for the game server's transport identity")
        .arg(
            Arg::with_name("OUT_FILE")
                .help("Path the new key file will be written to")
                .required(true),
        )
        .get_matches();

    let out_path = matches.value_of("OUT_FILE").unwrap();

    let pair = KeyPair::generate().expect("failed to generate RSA keypair");

    let key_file = KeyFile {
        n: pair.private.n().to_bytes_be(),
        e: pair.private.e().to_bytes_be(),
        d: pair.private.d().to_bytes_be(),
        primes: pair.private.primes().iter().map(|p| p.to_bytes_be()).collect(),
    };

    let json = serde_json::to_string_pretty(&key_file).expect("failed to serialize key file");
    fs::write(out_path, json).expect("failed to write key file");

    println!("Wrote a new {}-bit server keypair to {}", moonlapse_proto::crypto::KEY_BITS, out_path);
}
