fn main() -> Result<(), Box<dyn std::error::Error>> {
    ichat::cli::main()
}
