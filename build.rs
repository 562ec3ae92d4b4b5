//! Build script for Fisherman
//! Embeds the Windows manifest so input injection reaches elevated game clients

fn main() {
    // Only run on Windows
    #[cfg(windows)]
    {
        embed_windows_resources();
    }
}

#[cfg(windows)]
fn embed_windows_resources() {
    let mut res = winres::WindowsResource::new();

    // SendInput is filtered by UIPI unless we run at the same integrity level as the game
    res.set_manifest_file("fisherman.manifest");

    if std::path::Path::new("icons/icon.ico").exists() {
        res.set_icon("icons/icon.ico");
    }

    if let Err(e) = res.compile() {
        eprintln!("Warning: Failed to compile Windows resources: {}", e);
    }
}
