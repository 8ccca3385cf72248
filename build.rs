use std::process::Command;

// Embed the commit the server was built from; /api/health reports it so a
// browser client can tell which build it is talking to.
fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let hash = Command::new("git")
        .args(["log", "-1", "--format=%h"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|hash| hash.trim().to_owned())
        .unwrap_or_else(|| "dev".to_owned());

    println!("cargo:rustc-env=GIT_HASH={}", hash);
}
