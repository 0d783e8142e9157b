use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/models.rs");

    let crate_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => dir,
        Err(_) => return,
    };

    let mut header = PathBuf::from(&crate_dir);
    header.push("include");
    header.push("rewardbridge.h");

    // 头文件生成失败不阻断编译，宿主侧可沿用上一次的产物
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("REWARDBRIDGE_H")
        .generate()
    {
        Ok(bindings) => {
            if let Some(dir) = header.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            bindings.write_to_file(&header);
        }
        Err(e) => println!("cargo:warning=cbindgen skipped: {}", e),
    }
}
