use glob::glob;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A lightweight version of the TestInstance struct for the build script.
#[derive(Debug)]
struct TestInstance {
    pub name: String,
    pub path: PathBuf,
}

/// Discovers all test instances by scanning the `data/` directory.
fn get_all_instances() -> Vec<TestInstance> {
    glob("data/*.mtx")
        .expect("Failed to read glob pattern")
        .filter_map(|entry| {
            let path = entry.ok()?;
            let name = path
                .file_stem()?
                .to_string_lossy()
                .to_string()
                .replace('-', "_");
            Some(TestInstance { name, path })
        })
        .collect()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=data/");

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("sgmres_properties_tests.rs");
    let mut file = BufWriter::new(File::create(&dest_path).unwrap());

    for instance in get_all_instances() {
        let fn_name_base = &instance.name;
        let path_str = instance.path.to_str().unwrap();

        let test_template = |test_type: &str, runner_fn: &str| {
            format!(
                r#"
#[test]
fn property_{test_type}_{fn_name_base}() -> anyhow::Result<()> {{
    let instance = TestInstance {{
        name: "{name}".to_string(),
        path: "{path}".into(),
    }};
    {runner_fn}(&instance)
}}
"#,
                test_type = test_type,
                fn_name_base = fn_name_base,
                name = instance.name,
                path = path_str.escape_default(),
                runner_fn = runner_fn
            )
        };

        writeln!(
            file,
            "{}",
            test_template(
                "basis_orthonormality",
                "run_basis_orthonormality_test_for_instance"
            )
        )
        .unwrap();
        writeln!(
            file,
            "{}",
            test_template("qr_factorization", "run_qr_factorization_test_for_instance")
        )
        .unwrap();
        writeln!(
            file,
            "{}",
            test_template("sketch_embedding", "run_sketch_embedding_test_for_instance")
        )
        .unwrap();
        writeln!(
            file,
            "{}",
            test_template(
                "residual_estimate",
                "run_residual_estimate_test_for_instance"
            )
        )
        .unwrap();
    }
}
