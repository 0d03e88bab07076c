#[cfg(test)]
mod tests {
    use dip_smc_pso::cli::optimize::OptimizeParams;
    use dip_smc_pso::cli::simulate::SimulateParams;
    use glob::glob;
    use serde::de::DeserializeOwned;
    use std::any::type_name;
    use std::fs;

    /// Parse every `.json` file under `directory` as `T`.
    fn parse_all_parameter_files_or_panic<T: DeserializeOwned>(directory: &str) -> Vec<T> {
        let pattern = format!("{}/**/*.json", directory);

        let mut parsed = Vec::new();
        for entry in glob(&pattern).expect("Failed to read glob pattern") {
            match entry {
                Ok(path) => {
                    let content = fs::read_to_string(&path)
                        .unwrap_or_else(|_| panic!("Failed to read file: {:?}", path));

                    match serde_json::from_str::<T>(&content) {
                        Ok(params) => parsed.push(params),
                        Err(err) => {
                            panic!(
                                "Failed to parse JSON file: {:?} as parameter type: `{}`.\n\n{:?}\n",
                                path,
                                type_name::<T>(),
                                err
                            );
                        }
                    }
                }
                Err(e) => panic!("Failed to read path: {:?}. Check permissions.", e),
            }
        }
        parsed
    }

    #[test]
    fn optimize_parameter_files_parse_and_validate() {
        let all = parse_all_parameter_files_or_panic::<OptimizeParams>("params/optimize");
        assert!(!all.is_empty());
        for params in all {
            params
                .optimization
                .validate()
                .unwrap_or_else(|err| panic!("{:?} is invalid: {}", params, err));
        }
    }

    #[test]
    fn simulate_parameter_files_parse_and_validate() {
        let all = parse_all_parameter_files_or_panic::<SimulateParams>("params/simulate");
        assert!(!all.is_empty());
        for params in all {
            assert!(params.simulation.validate().is_ok());
            assert!(params.controller.validate().is_ok());
            assert!(params.cost.validate().is_ok());
        }
    }

    #[test]
    fn test_parameter_files_parse() {
        parse_all_parameter_files_or_panic::<OptimizeParams>("tests/param_files/optimize");
        parse_all_parameter_files_or_panic::<SimulateParams>("tests/param_files/simulate");
    }
}
