fn main() -> Result<(), Box<dyn std::error::Error>> {
	let mut emitter = vergen_gitcl::Emitter::default();

	emitter.add_instructions(&vergen_gitcl::CargoBuilder::default().target_triple(true).build()?)?;

	// Source tarballs carry no git metadata.
	if emitter.add_instructions(&vergen_gitcl::GitclBuilder::default().sha(true).build()?).is_err() {
		println!("cargo:rustc-env=VERGEN_GIT_SHA=unknown");
	}

	emitter.emit()?;

	Ok(())
}
