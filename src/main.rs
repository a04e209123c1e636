fn main() -> std::process::ExitCode {
    nexus_launcher_lib::run()
}
