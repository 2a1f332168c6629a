mod test_irradiance_scenarios;
