//! Generate, verify and refresh JWTs from the command line.
//!
//! Loads `.env` automatically if present, otherwise reads from the environment.
//! Set `RUST_LOG=jwt_guard=debug` to see the codec's logging.
//!
//! ```bash
//! cargo run --example token -- generate 42 'App\Models\User'
//! cargo run --example token -- verify eyJhbG...
//! cargo run --example token -- refresh eyJhbG...
//! ```

use jwt_guard::{CustomClaims, JwtCodec, JwtConfig, TokenCodec};
use tracing_subscriber::EnvFilter;

fn main() {
    // Load .env if present; silently ignore if absent.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = JwtConfig::from_env().expect("JWT_SECRET must be set");
    let codec = JwtCodec::new(config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let arg = args.get(1).unwrap_or_else(|| usage());
    let result = match args[0].as_str() {
        "generate" => codec.encode(arg, args.get(2).map(String::as_str), CustomClaims::new()),
        "refresh" => codec.refresh(arg, false, false),
        "verify" => match codec.decode(arg) {
            Ok(c) => {
                println!("Valid\n");
                println!("  sub : {}", c.sub);
                if let Some(iss) = &c.iss {
                    println!("  iss : {iss}");
                }
                if let Some(aud) = &c.aud {
                    println!("  aud : {}", aud.join(", "));
                }
                println!("  iat : {}", c.iat);
                println!("  exp : {}", c.exp);
                println!("  nbf : {}", c.nbf);
                println!("  jti : {}", c.jti);
                if let Some(prv) = &c.prv {
                    println!("  prv : {prv}");
                }
                for (name, value) in &c.custom {
                    println!("  {name} : {value}");
                }
                return;
            }
            Err(e) => Err(e),
        },
        _ => usage(),
    };

    match result {
        Ok(token) => println!("{token}"),
        Err(e) => {
            eprintln!("Failed: {e}");
            std::process::exit(1);
        }
    }
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  cargo run --example token -- generate <user_id> [principal_type]");
    eprintln!("  cargo run --example token -- verify   <token>");
    eprintln!("  cargo run --example token -- refresh  <token>");
    std::process::exit(1);
}
