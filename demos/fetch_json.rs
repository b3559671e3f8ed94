use std::time::Duration;

use reqcat::prelude::{Error, Request};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut request = Request::new()?
        .get()
        .url_with("https://httpbin.org/get", [("source", "reqcat-demo")])
        .user_agent("reqcat-demo/0.1")
        .encoding("")
        .timeout(5)
        .follow_location(true)
        .attempts(3, Duration::from_millis(300))?;

    match request.fetch_json(true) {
        Ok(document) => {
            println!("status={}", request.status()?);
            println!("args={}", document["args"]);
        }
        Err(error) => {
            println!("error_code={}", error.code().as_str());
            match &error {
                Error::HttpStatus { status, .. } => println!("http status error: status={status}"),
                Error::Transport { kind, .. } => println!("transport error kind={kind}"),
                other => println!("other error: {other}"),
            }
        }
    }

    for failure in request.failures()? {
        println!("attempt {} failed: {failure}", failure.attempt());
    }
    println!("attempts={}", request.attempts_used()?);
    Ok(())
}
