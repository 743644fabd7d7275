use std::io::Read;

use dayforge_core::RpcHandler;

use crate::context::CliResult;

pub fn run(request: Option<String>) -> CliResult {
    let request = match request {
        Some(request) => request,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let handler = RpcHandler::new(dayforge_core::Config::load_or_default());
    println!("{}", handler.handle(&request));
    Ok(())
}
